use serde::Serialize;

use crate::db::User;
use crate::links::{LinkBuilder, Links};
use crate::validation::{Field, Schema};

pub const REGISTER_USER: Schema = Schema(&[
    Field::email("email").length(10, 100).required(),
    Field::str("password").length(4, 100).required(),
    Field::str("first_name").length(2, 50).required(),
    Field::str("last_name").length(2, 50).required(),
    Field::str("address").length(0, 100),
]);

/// Blank fields keep their stored value.
pub const USER_SETTINGS: Schema = Schema(&[
    Field::str("first_name").length(2, 50),
    Field::str("last_name").length(2, 50),
    Field::str("address").length(0, 100),
]);

/// `email` names the account when the token carries no user.
pub const ACCESS_KEY_REQUEST: Schema = Schema(&[
    Field::str("purpose").required(),
    Field::email("email").length(10, 100),
]);

pub const CHANGE_EMAIL: Schema = Schema(&[Field::email("email").length(10, 100).required()]);

pub const CONFIRM_EMAIL: Schema = Schema(&[Field::str("key").required()]);

pub const RESET_PASSWORD: Schema = Schema(&[
    Field::str("key").required(),
    Field::str("password").length(4, 100).required(),
]);

#[derive(Debug, Serialize)]
pub struct UserModel {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub is_verified: bool,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl UserModel {
    pub fn new(links: LinkBuilder<'_>, user: User) -> Self {
        let id = user.id.to_string();
        Self {
            links: Links::from([
                ("self", links.api(&["users", &id])),
                ("reviews", links.api(&["users", &id, "reviews"])),
                ("orders", links.api(&["users", &id, "orders"])),
            ]),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            address: user.address.filter(|a| !a.is_empty()),
            is_verified: user.is_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessKeyResponse {
    pub key: String,
    pub purpose: crate::auth::KeyPurpose,
    pub expires_in_minutes: i64,
}
