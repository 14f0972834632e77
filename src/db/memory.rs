use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{
    AcceptOutcome, NewOrder, NewProduct, NewReview, NewUser, Order, OrderStatus, Product,
    ProductPatch, Review, Scope, Store, User, UserSettings, PLACEHOLDER_IMAGE,
};
use crate::listing::{
    Listing, OrderSort, Page, ProductSort, ReviewSort, UserFilter, UserSort, Window,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    products: Vec<Product>,
    users: Vec<User>,
    reviews: Vec<Review>,
    orders: Vec<Order>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product_name(&self, id: i64) -> anyhow::Result<String> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
            .ok_or_else(|| anyhow::anyhow!("foreign key: product {id} does not exist"))
    }

    fn ensure_user(&self, id: i64) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.users.iter().any(|u| u.id == id),
            "foreign key: user {id} does not exist"
        );
        Ok(())
    }
}

/// In-process `Store` mirroring the Postgres semantics.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    broken: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later product/review write fail like a lost connection.
    pub fn break_writes(&self) {
        self.broken.store(true, AtomicOrdering::SeqCst);
    }

    fn writable(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.broken.load(AtomicOrdering::SeqCst),
            "connection reset by peer"
        );
        Ok(())
    }
}

fn in_scope(scope: Scope, product_id: i64, owner_id: i64) -> bool {
    match scope {
        Scope::All => true,
        Scope::Product(id) => product_id == id,
        Scope::Owner(id) => owner_id == id,
    }
}

fn paginate<T>(mut rows: Vec<T>, window: Window) -> Page<T> {
    let total = rows.len();
    let (offset, len) = window.resolve(total);
    let items = rows.drain(offset..offset + len).collect();
    Page { items, total }
}

fn by_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_products(&self, listing: &Listing<ProductSort>) -> anyhow::Result<Page<Product>> {
        let tables = self.tables.read().await;
        let mut rows = tables.products.clone();
        rows.sort_by(|a, b| {
            let primary = match listing.sort {
                None => Ordering::Equal,
                Some(ProductSort::Popular) => b.sales.cmp(&a.sales),
                Some(ProductSort::AscPrice) => by_f64(a.price, b.price),
                Some(ProductSort::DescPrice) => by_f64(b.price, a.price),
                Some(ProductSort::Alphabet) => a.name.cmp(&b.name),
            };
            primary.then(a.id.cmp(&b.id))
        });
        Ok(paginate(rows, listing.window))
    }

    async fn find_product(&self, name: &str) -> anyhow::Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.iter().find(|p| p.name == name).cloned())
    }

    async fn create_product(&self, new: NewProduct) -> anyhow::Result<Product> {
        self.writable()?;
        let mut tables = self.tables.write().await;
        let product = Product {
            id: tables.id(),
            name: new.name,
            description: new.description,
            price: new.price,
            sales: 0,
            image_url: new.image_url.unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        };
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: i64, patch: ProductPatch) -> anyhow::Result<Product> {
        self.writable()?;
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow::anyhow!("no rows returned by update"))?;
        if let Some(name) = &patch.name {
            product.name = name.clone();
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(description) = patch.description {
            product.description = Some(description);
        }
        if let Some(image_url) = patch.image_url {
            product.image_url = image_url;
        }
        let product = product.clone();
        // joined rows carry the product name
        if let Some(name) = patch.name {
            for review in tables.reviews.iter_mut().filter(|r| r.product_id == id) {
                review.product_name = name.clone();
            }
            for order in tables.orders.iter_mut().filter(|o| o.product_id == id) {
                order.product_name = name.clone();
            }
        }
        Ok(product)
    }

    async fn delete_product(&self, id: i64) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        tables.reviews.retain(|r| r.product_id != id);
        tables.orders.retain(|o| o.product_id != id);
        tables.products.retain(|p| p.id != id);
        Ok(())
    }

    async fn list_reviews(
        &self,
        scope: Scope,
        listing: &Listing<ReviewSort>,
    ) -> anyhow::Result<Page<Review>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| in_scope(scope, r.product_id, r.owner_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let primary = match listing.sort {
                None => Ordering::Equal,
                Some(ReviewSort::AscRating) => a.rating.cmp(&b.rating),
                Some(ReviewSort::DescRating) => b.rating.cmp(&a.rating),
            };
            primary.then(a.id.cmp(&b.id))
        });
        Ok(paginate(rows, listing.window))
    }

    async fn find_review(&self, id: i64) -> anyhow::Result<Option<Review>> {
        let tables = self.tables.read().await;
        Ok(tables.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn create_review(&self, new: NewReview) -> anyhow::Result<Review> {
        self.writable()?;
        let mut tables = self.tables.write().await;
        let product_name = tables.product_name(new.product_id)?;
        tables.ensure_user(new.owner_id)?;
        let review = Review {
            id: tables.id(),
            owner_id: new.owner_id,
            product_id: new.product_id,
            product_name,
            text: new.text,
            rating: new.rating,
            image_url: new.image_url,
        };
        tables.reviews.push(review.clone());
        Ok(review)
    }

    async fn list_orders(
        &self,
        scope: Scope,
        listing: &Listing<OrderSort>,
    ) -> anyhow::Result<Page<Order>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| in_scope(scope, o.product_id, o.owner_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let primary = match listing.sort {
                None => Ordering::Equal,
                Some(OrderSort::AscDate) => a.created_at.cmp(&b.created_at),
                Some(OrderSort::DescDate) => b.created_at.cmp(&a.created_at),
            };
            primary.then(a.id.cmp(&b.id))
        });
        Ok(paginate(rows, listing.window))
    }

    async fn find_order(&self, id: i64) -> anyhow::Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn create_order(&self, new: NewOrder) -> anyhow::Result<Order> {
        let mut tables = self.tables.write().await;
        let product_name = tables.product_name(new.product_id)?;
        tables.ensure_user(new.owner_id)?;
        let order = Order {
            id: tables.id(),
            product_id: new.product_id,
            product_name,
            owner_id: new.owner_id,
            address: new.address,
            wishes: new.wishes,
            created_at: OffsetDateTime::now_utc(),
            status: OrderStatus::Created.as_str().to_string(),
        };
        tables.orders.push(order.clone());
        Ok(order)
    }

    async fn accept_order(&self, id: i64) -> anyhow::Result<AcceptOutcome> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.iter_mut().find(|o| o.id == id) else {
            return Ok(AcceptOutcome::Missing);
        };
        if order.status != OrderStatus::Created.as_str() {
            return Ok(AcceptOutcome::AlreadyAccepted);
        }
        order.status = OrderStatus::Accepted.as_str().to_string();
        let accepted = order.clone();
        if let Some(product) = tables.products.iter_mut().find(|p| p.id == accepted.product_id) {
            product.sales += 1;
        }
        Ok(AcceptOutcome::Accepted(accepted))
    }

    async fn list_users(
        &self,
        filter: Option<UserFilter>,
        listing: &Listing<UserSort>,
    ) -> anyhow::Result<Page<User>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<User> = tables
            .users
            .iter()
            .filter(|u| match filter {
                None => true,
                Some(UserFilter::IsVerified) => u.is_verified,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let primary = match listing.sort {
                None => Ordering::Equal,
                Some(UserSort::Email) => a.email.cmp(&b.email),
                Some(UserSort::Name) => a
                    .last_name
                    .cmp(&b.last_name)
                    .then_with(|| a.first_name.cmp(&b.first_name)),
            };
            primary.then(a.id.cmp(&b.id))
        });
        Ok(paginate(rows, listing.window))
    }

    async fn find_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let user = User {
            id: tables.id(),
            email: new.email,
            password_hash: new.password_hash,
            is_verified: false,
            first_name: new.first_name,
            last_name: new.last_name,
            address: new.address,
        };
        tables.users.push(user.clone());
        Ok(Some(user))
    }

    async fn update_user_settings(&self, id: i64, settings: UserSettings) -> anyhow::Result<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("no rows returned by update"))?;
        user.first_name = settings.first_name;
        user.last_name = settings.last_name;
        user.address = settings.address;
        Ok(user.clone())
    }

    async fn set_user_verified(&self, id: i64) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.is_verified = true;
        }
        Ok(())
    }

    async fn set_user_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn set_user_email(&self, id: i64, email: &str) -> anyhow::Result<Option<User>> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == email && u.id != id) {
            return Ok(None);
        }
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("no rows returned by update"))?;
        user.is_verified = user.is_verified && user.email == email;
        user.email = email.to_string();
        Ok(Some(user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStore, Product, User) {
        let store = MemoryStore::new();
        let product = store
            .create_product(NewProduct {
                name: "Croissant".into(),
                price: 1.49,
                description: None,
                image_url: None,
            })
            .await
            .unwrap();
        let user = store
            .create_user(NewUser {
                email: "baker@example.com".into(),
                password_hash: "x".into(),
                first_name: "Ann".into(),
                last_name: "Baker".into(),
                address: None,
            })
            .await
            .unwrap()
            .unwrap();
        (store, product, user)
    }

    #[tokio::test]
    async fn product_defaults_to_placeholder_image() {
        let (_, product, _) = seeded().await;
        assert_eq!(product.image_url, PLACEHOLDER_IMAGE);
        assert_eq!(product.sales, 0);
    }

    #[tokio::test]
    async fn review_requires_existing_product() {
        let (store, _, user) = seeded().await;
        let err = store
            .create_review(NewReview {
                product_id: 999,
                owner_id: user.id,
                rating: 3,
                text: None,
                image_url: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("foreign key"));
    }

    #[tokio::test]
    async fn delete_cascades_to_reviews_and_orders() {
        let (store, product, user) = seeded().await;
        store
            .create_review(NewReview {
                product_id: product.id,
                owner_id: user.id,
                rating: 5,
                text: None,
                image_url: None,
            })
            .await
            .unwrap();
        store
            .create_order(NewOrder {
                product_id: product.id,
                owner_id: user.id,
                address: "Main st".into(),
                wishes: None,
            })
            .await
            .unwrap();

        store.delete_product(product.id).await.unwrap();

        let reviews = store.list_reviews(Scope::All, &Listing::default()).await.unwrap();
        let orders = store.list_orders(Scope::All, &Listing::default()).await.unwrap();
        assert_eq!(reviews.total, 0);
        assert_eq!(orders.total, 0);
        assert!(store.find_product("Croissant").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (store, _, _) = seeded().await;
        let again = store
            .create_user(NewUser {
                email: "baker@example.com".into(),
                password_hash: "y".into(),
                first_name: "Bob".into(),
                last_name: "Baker".into(),
                address: None,
            })
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn email_change_checks_other_users_and_drops_verification() {
        let (store, _, user) = seeded().await;
        store.set_user_verified(user.id).await.unwrap();
        let other = store
            .create_user(NewUser {
                email: "other@example.com".into(),
                password_hash: "y".into(),
                first_name: "Bob".into(),
                last_name: "Baker".into(),
                address: None,
            })
            .await
            .unwrap()
            .unwrap();

        let same = store.set_user_email(user.id, "baker@example.com").await.unwrap().unwrap();
        assert!(same.is_verified);

        assert!(store.set_user_email(user.id, &other.email).await.unwrap().is_none());

        let moved = store.set_user_email(user.id, "new@example.com").await.unwrap().unwrap();
        assert_eq!(moved.email, "new@example.com");
        assert!(!moved.is_verified);
        assert!(store.find_user_by_email("baker@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn broken_store_refuses_writes() {
        let (store, _, _) = seeded().await;
        store.break_writes();
        let err = store
            .create_product(NewProduct {
                name: "Bagel".into(),
                price: 2.0,
                description: None,
                image_url: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn accept_is_single_step() {
        let (store, product, user) = seeded().await;
        let order = store
            .create_order(NewOrder {
                product_id: product.id,
                owner_id: user.id,
                address: "Main st".into(),
                wishes: None,
            })
            .await
            .unwrap();

        let first = store.accept_order(order.id).await.unwrap();
        assert!(matches!(first, AcceptOutcome::Accepted(ref o) if o.status == "accepted"));
        assert_eq!(store.accept_order(order.id).await.unwrap(), AcceptOutcome::AlreadyAccepted);
        assert_eq!(store.accept_order(12345).await.unwrap(), AcceptOutcome::Missing);
        assert_eq!(store.find_product("Croissant").await.unwrap().unwrap().sales, 1);
    }
}
