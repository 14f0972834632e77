//! Persistence: record types and the `Store` every handler talks to.

#[cfg(test)]
pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;

pub use models::{
    NewOrder, NewProduct, NewReview, NewUser, Order, OrderStatus, Product, ProductPatch, Review,
    Scope, User, UserSettings, PLACEHOLDER_IMAGE,
};

use crate::listing::{Listing, OrderSort, Page, ProductSort, ReviewSort, UserFilter, UserSort};

/// Result of the `created` → `accepted` order transition.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    Accepted(Order),
    AlreadyAccepted,
    Missing,
}

/// Repository over the four record types. Each call is its own unit of work;
/// multi-statement mutations are atomic.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_products(&self, listing: &Listing<ProductSort>) -> anyhow::Result<Page<Product>>;
    /// Oldest product carrying `name`.
    async fn find_product(&self, name: &str) -> anyhow::Result<Option<Product>>;
    async fn create_product(&self, new: NewProduct) -> anyhow::Result<Product>;
    async fn update_product(&self, id: i64, patch: ProductPatch) -> anyhow::Result<Product>;
    /// Deletes the product's reviews and orders, then the product.
    async fn delete_product(&self, id: i64) -> anyhow::Result<()>;

    async fn list_reviews(
        &self,
        scope: Scope,
        listing: &Listing<ReviewSort>,
    ) -> anyhow::Result<Page<Review>>;
    async fn find_review(&self, id: i64) -> anyhow::Result<Option<Review>>;
    async fn create_review(&self, new: NewReview) -> anyhow::Result<Review>;

    async fn list_orders(
        &self,
        scope: Scope,
        listing: &Listing<OrderSort>,
    ) -> anyhow::Result<Page<Order>>;
    async fn find_order(&self, id: i64) -> anyhow::Result<Option<Order>>;
    async fn create_order(&self, new: NewOrder) -> anyhow::Result<Order>;
    /// Moves a `created` order to `accepted` and counts the sale.
    async fn accept_order(&self, id: i64) -> anyhow::Result<AcceptOutcome>;

    async fn list_users(
        &self,
        filter: Option<UserFilter>,
        listing: &Listing<UserSort>,
    ) -> anyhow::Result<Page<User>>;
    async fn find_user(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// `None` when the email is already registered.
    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>>;
    async fn update_user_settings(&self, id: i64, settings: UserSettings) -> anyhow::Result<User>;
    async fn set_user_verified(&self, id: i64) -> anyhow::Result<()>;
    async fn set_user_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()>;
    /// `None` when another user holds `email`. A changed email drops verification.
    async fn set_user_email(&self, id: i64, email: &str) -> anyhow::Result<Option<User>>;
}
