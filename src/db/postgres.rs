use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::{
    AcceptOutcome, NewOrder, NewProduct, NewReview, NewUser, Order, OrderStatus, Product,
    ProductPatch, Review, Scope, Store, User, UserSettings,
};
use crate::listing::{
    Listing, OrderSort, Page, ProductSort, ReviewSort, SortKey, UserFilter, UserSort,
};

const PRODUCT_COLUMNS: &str = "id, name, description, price, sales, image_url";
const USER_COLUMNS: &str =
    "id, email, password_hash, is_verified, first_name, last_name, address";

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.owner_id, r.product_id, p.name AS product_name,
           r.text, r.rating, r.image_url
      FROM reviews r
      JOIN products p ON p.id = r.product_id
"#;

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.product_id, p.name AS product_name, o.owner_id,
           o.address, o.wishes, o.created_at, o.status
      FROM orders o
      JOIN products p ON p.id = o.product_id
"#;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

/// `(product_id, owner_id)` filters bound into the dependent-row queries.
fn scope_ids(scope: Scope) -> (Option<i64>, Option<i64>) {
    match scope {
        Scope::All => (None, None),
        Scope::Product(id) => (Some(id), None),
        Scope::Owner(id) => (None, Some(id)),
    }
}

fn offset_limit<S>(listing: &Listing<S>, total: i64) -> (usize, i64, i64) {
    let total = total.max(0) as usize;
    let (offset, len) = listing.window.resolve(total);
    (total, offset as i64, len as i64)
}

#[async_trait]
impl Store for PgStore {
    async fn list_products(&self, listing: &Listing<ProductSort>) -> anyhow::Result<Page<Product>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.db)
            .await
            .context("count products")?;
        let (total, offset, limit) = offset_limit(listing, total);
        if limit == 0 {
            return Ok(Page { items: Vec::new(), total });
        }

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p ORDER BY {} LIMIT $1 OFFSET $2",
            ProductSort::sql(listing.sort)
        );
        let items = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list products")?;
        Ok(Page { items, total })
    }

    async fn find_product(&self, name: &str) -> anyhow::Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE name = $1 ORDER BY id LIMIT 1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(name)
            .fetch_optional(&self.db)
            .await
            .context("find product by name")?;
        Ok(product)
    }

    async fn create_product(&self, new: NewProduct) -> anyhow::Result<Product> {
        let sql = format!(
            r#"
            INSERT INTO products (name, price, description, image_url)
            VALUES ($1, $2, $3, COALESCE($4, '{}'))
            RETURNING {PRODUCT_COLUMNS}
            "#,
            super::PLACEHOLDER_IMAGE
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(&new.name)
            .bind(new.price)
            .bind(&new.description)
            .bind(&new.image_url)
            .fetch_one(&self.db)
            .await
            .context("insert product")?;
        Ok(product)
    }

    async fn update_product(&self, id: i64, patch: ProductPatch) -> anyhow::Result<Product> {
        let sql = format!(
            r#"
            UPDATE products
               SET name = COALESCE($2, name),
                   price = COALESCE($3, price),
                   description = COALESCE($4, description),
                   image_url = COALESCE($5, image_url)
             WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(patch.price)
            .bind(&patch.description)
            .bind(&patch.image_url)
            .fetch_one(&self.db)
            .await
            .context("update product")?;
        Ok(product)
    }

    async fn delete_product(&self, id: i64) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM reviews WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete product reviews")?;
        sqlx::query("DELETE FROM orders WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete product orders")?;
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete product")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn list_reviews(
        &self,
        scope: Scope,
        listing: &Listing<ReviewSort>,
    ) -> anyhow::Result<Page<Review>> {
        let (product_id, owner_id) = scope_ids(scope);
        const FILTER: &str = "($1::BIGINT IS NULL OR r.product_id = $1) AND ($2::BIGINT IS NULL OR r.owner_id = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM reviews r WHERE {FILTER}"))
            .bind(product_id)
            .bind(owner_id)
            .fetch_one(&self.db)
            .await
            .context("count reviews")?;
        let (total, offset, limit) = offset_limit(listing, total);
        if limit == 0 {
            return Ok(Page { items: Vec::new(), total });
        }

        let sql = format!(
            "{REVIEW_SELECT} WHERE {FILTER} ORDER BY {} LIMIT $3 OFFSET $4",
            ReviewSort::sql(listing.sort)
        );
        let items = sqlx::query_as::<_, Review>(&sql)
            .bind(product_id)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list reviews")?;
        Ok(Page { items, total })
    }

    async fn find_review(&self, id: i64) -> anyhow::Result<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find review")?;
        Ok(review)
    }

    async fn create_review(&self, new: NewReview) -> anyhow::Result<Review> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            WITH r AS (
                INSERT INTO reviews (product_id, owner_id, rating, text, image_url)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT r.id, r.owner_id, r.product_id, p.name AS product_name,
                   r.text, r.rating, r.image_url
              FROM r
              JOIN products p ON p.id = r.product_id
            "#,
        )
        .bind(new.product_id)
        .bind(new.owner_id)
        .bind(new.rating)
        .bind(&new.text)
        .bind(&new.image_url)
        .fetch_one(&self.db)
        .await
        .context("insert review")?;
        Ok(review)
    }

    async fn list_orders(
        &self,
        scope: Scope,
        listing: &Listing<OrderSort>,
    ) -> anyhow::Result<Page<Order>> {
        let (product_id, owner_id) = scope_ids(scope);
        const FILTER: &str = "($1::BIGINT IS NULL OR o.product_id = $1) AND ($2::BIGINT IS NULL OR o.owner_id = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders o WHERE {FILTER}"))
            .bind(product_id)
            .bind(owner_id)
            .fetch_one(&self.db)
            .await
            .context("count orders")?;
        let (total, offset, limit) = offset_limit(listing, total);
        if limit == 0 {
            return Ok(Page { items: Vec::new(), total });
        }

        let sql = format!(
            "{ORDER_SELECT} WHERE {FILTER} ORDER BY {} LIMIT $3 OFFSET $4",
            OrderSort::sql(listing.sort)
        );
        let items = sqlx::query_as::<_, Order>(&sql)
            .bind(product_id)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list orders")?;
        Ok(Page { items, total })
    }

    async fn find_order(&self, id: i64) -> anyhow::Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find order")?;
        Ok(order)
    }

    async fn create_order(&self, new: NewOrder) -> anyhow::Result<Order> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            WITH o AS (
                INSERT INTO orders (product_id, owner_id, address, wishes, status)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT o.id, o.product_id, p.name AS product_name, o.owner_id,
                   o.address, o.wishes, o.created_at, o.status
              FROM o
              JOIN products p ON p.id = o.product_id
            "#,
        )
        .bind(new.product_id)
        .bind(new.owner_id)
        .bind(&new.address)
        .bind(&new.wishes)
        .bind(OrderStatus::Created.as_str())
        .fetch_one(&self.db)
        .await
        .context("insert order")?;
        Ok(order)
    }

    async fn accept_order(&self, id: i64) -> anyhow::Result<AcceptOutcome> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let product_id: Option<i64> = sqlx::query_scalar(
            "UPDATE orders SET status = $2 WHERE id = $1 AND status = $3 RETURNING product_id",
        )
        .bind(id)
        .bind(OrderStatus::Accepted.as_str())
        .bind(OrderStatus::Created.as_str())
        .fetch_optional(&mut *tx)
        .await
        .context("accept order")?;

        let Some(product_id) = product_id else {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("find order")?;
            return Ok(if exists.is_some() {
                AcceptOutcome::AlreadyAccepted
            } else {
                AcceptOutcome::Missing
            });
        };

        sqlx::query("UPDATE products SET sales = sales + 1 WHERE id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .context("count sale")?;
        tx.commit().await.context("commit tx")?;

        match self.find_order(id).await? {
            Some(order) => Ok(AcceptOutcome::Accepted(order)),
            None => Ok(AcceptOutcome::Missing),
        }
    }

    async fn list_users(
        &self,
        filter: Option<UserFilter>,
        listing: &Listing<UserSort>,
    ) -> anyhow::Result<Page<User>> {
        let verified = filter.map(|UserFilter::IsVerified| true);
        const FILTER: &str = "($1::BOOLEAN IS NULL OR u.is_verified = $1)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users u WHERE {FILTER}"))
            .bind(verified)
            .fetch_one(&self.db)
            .await
            .context("count users")?;
        let (total, offset, limit) = offset_limit(listing, total);
        if limit == 0 {
            return Ok(Page { items: Vec::new(), total });
        }

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE {FILTER} ORDER BY {} LIMIT $2 OFFSET $3",
            UserSort::sql(listing.sort)
        );
        let items = sqlx::query_as::<_, User>(&sql)
            .bind(verified)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list users")?;
        Ok(Page { items, total })
    }

    async fn find_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user")?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, address)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.address)
            .fetch_optional(&self.db)
            .await
            .context("insert user")?;
        Ok(user)
    }

    async fn update_user_settings(&self, id: i64, settings: UserSettings) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET first_name = $2, last_name = $3, address = $4
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&settings.first_name)
            .bind(&settings.last_name)
            .bind(&settings.address)
            .fetch_one(&self.db)
            .await
            .context("update user settings")?;
        Ok(user)
    }

    async fn set_user_verified(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET is_verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("verify user")?;
        Ok(())
    }

    async fn set_user_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("set user password")?;
        Ok(())
    }

    async fn set_user_email(&self, id: i64, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
               SET email = $2, is_verified = is_verified AND email = $2
             WHERE id = $1
               AND NOT EXISTS (SELECT 1 FROM users WHERE email = $2 AND id <> $1)
            RETURNING {USER_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(email)
            .fetch_optional(&self.db)
            .await;
        match updated {
            Ok(user) => Ok(user),
            // a concurrent registration took the address after the check
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("set user email")),
        }
    }
}
