use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Image shown for products created without one.
pub const PLACEHOLDER_IMAGE: &str = "/static/images/notfound.png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub sales: i32,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string
    pub is_verified: bool,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
}

/// Review row joined with its product's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: i64,
    pub owner_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub text: Option<String>,
    pub rating: i32,
    pub image_url: Option<String>,
}

/// Order row joined with its product's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub owner_id: i64,
    pub address: String,
    pub wishes: Option<String>,
    pub created_at: OffsetDateTime,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    Accepted,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Accepted => "accepted",
        }
    }
}

/// Which rows of a dependent collection a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Product(i64),
    Owner(i64),
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Fields left `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: i64,
    pub owner_id: i64,
    pub rating: i32,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub product_id: i64,
    pub owner_id: i64,
    pub address: String,
    pub wishes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserSettings {
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
}
