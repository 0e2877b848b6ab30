//! `PostgreSQL` cart store.
//!
//! Carts live in the `carts` table as JSONB documents. `user_id` and
//! `guest_id` are unique columns and a check constraint keeps exactly one of
//! them set. `version` backs the optimistic concurrency check.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{CartStore, MergeCommit, StoreError};
use crate::domain::{Cart, CartDocument, GuestId, OwnerKey, UserId};

pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn owner_column(owner: &OwnerKey) -> (&'static str, &str) {
    match owner {
        OwnerKey::User(id) => ("user_id", id.as_str()),
        OwnerKey::Guest(id) => ("guest_id", id.as_str()),
    }
}

fn write_error(error: sqlx::Error, cart_id: Uuid) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(cart_id.to_string()),
        _ => StoreError::Database(error),
    }
}

/// Insert or version-checked update of one cart. Returns the new version.
async fn write(conn: &mut PgConnection, cart: &Cart) -> Result<u64, StoreError> {
    let user_id = cart.owner().user_id().map(UserId::as_str);
    let guest_id = cart.owner().guest_id().map(GuestId::as_str);
    let document = Json(cart.to_document());

    if cart.version() == 0 {
        sqlx::query(
            "INSERT INTO carts (id, user_id, guest_id, document, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 1, $5, $6)",
        )
        .bind(cart.id()).bind(user_id).bind(guest_id).bind(document).bind(cart.created_at()).bind(cart.updated_at())
        .execute(&mut *conn).await.map_err(|e| write_error(e, cart.id()))?;
        return Ok(1);
    }

    let expected = i64::try_from(cart.version()).map_err(|_| StoreError::Conflict(cart.id().to_string()))?;
    let result = sqlx::query(
        "UPDATE carts SET user_id = $2, guest_id = $3, document = $4, version = version + 1, updated_at = $5 \
         WHERE id = $1 AND version = $6",
    )
    .bind(cart.id()).bind(user_id).bind(guest_id).bind(document).bind(cart.updated_at()).bind(expected)
    .execute(&mut *conn).await.map_err(|e| write_error(e, cart.id()))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(cart.id().to_string()));
    }
    Ok(cart.version() + 1)
}

async fn remove(conn: &mut PgConnection, owner: &OwnerKey) -> Result<bool, StoreError> {
    let (column, value) = owner_column(owner);
    let result = sqlx::query(&format!("DELETE FROM carts WHERE {column} = $1"))
        .bind(value)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn find(&self, owner: &OwnerKey) -> Result<Option<Cart>, StoreError> {
        let (column, value) = owner_column(owner);
        let row: Option<(Json<CartDocument>, i64)> =
            sqlx::query_as(&format!("SELECT document, version FROM carts WHERE {column} = $1"))
                .bind(value)
                .fetch_optional(&self.pool)
                .await?;

        let Some((Json(document), version)) = row else { return Ok(None) };
        let version = u64::try_from(version).map_err(|_| StoreError::InvalidVersion(version))?;
        Ok(Some(Cart::from_document(document, version)?))
    }

    async fn save(&self, cart: &mut Cart) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        let version = write(&mut conn, cart).await?;
        cart.mark_persisted(version);
        Ok(())
    }

    async fn delete(&self, owner: &OwnerKey) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        remove(&mut conn, owner).await
    }

    /// Writes the user cart and deletes the guest cart in one transaction, so
    /// no absorbed guest record needs to be kept.
    async fn commit_merge(&self, user_cart: &mut Cart, guest_cart: &Cart) -> Result<MergeCommit, StoreError> {
        user_cart.settle_guest(guest_cart.id());
        let mut tx = self.pool.begin().await?;
        let version = write(&mut tx, user_cart).await?;
        remove(&mut tx, guest_cart.owner()).await?;
        tx.commit().await?;
        user_cart.mark_persisted(version);
        Ok(MergeCommit::GuestDeleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use rust_decimal::Decimal;
    use sqlx::error::{DatabaseError, ErrorKind};
    use sqlx::postgres::PgPoolOptions;

    use crate::domain::{CartLineItem, LineKey, Money, ProductId, Quantity, Size};

    #[derive(Debug)]
    struct FakeDbError {
        unique: bool,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "fake database error") }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str { "fake" }
        fn code(&self) -> Option<Cow<'_, str>> { None }
        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) { self }
        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) { self }
        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> { self }
        fn kind(&self) -> ErrorKind { if self.unique { ErrorKind::UniqueViolation } else { ErrorKind::Other } }
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let id = Uuid::now_v7();
        let err = write_error(sqlx::Error::Database(Box::new(FakeDbError { unique: true })), id);
        assert!(matches!(err, StoreError::Conflict(ref cart) if *cart == id.to_string()));

        let err = write_error(sqlx::Error::Database(Box::new(FakeDbError { unique: false })), id);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(matches!(write_error(sqlx::Error::RowNotFound, id), StoreError::Database(_)));
    }

    #[test]
    fn test_owner_column() {
        assert_eq!(owner_column(&OwnerKey::User(UserId::from("u1"))), ("user_id", "u1"));
        assert_eq!(owner_column(&OwnerKey::Guest(GuestId::from("g1"))), ("guest_id", "g1"));
    }

    /// Connects to `DATABASE_URL` and migrates it. `None` skips the test.
    async fn store() -> Option<PgCartStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.expect("DATABASE_URL unreachable");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations failed");
        Some(PgCartStore::new(pool))
    }

    fn unique(prefix: &str) -> String { format!("{prefix}_{}", Uuid::now_v7().simple()) }

    fn cart(owner: OwnerKey, product: &str, qty: u32) -> Cart {
        Cart::create(
            owner,
            CartLineItem {
                product_id: ProductId::from(product), name: product.into(), image_url: None,
                unit_price: Money::new(Decimal::new(1000, 2)), size: Size::from("M"), quantity: Quantity::new(qty).unwrap(),
            },
        )
    }

    fn key_a() -> LineKey { LineKey::new(ProductId::from("A"), Size::from("M")) }

    fn quantity(cart: &Cart, product: &str) -> Option<u32> {
        cart.items().find(|l| l.product_id.as_str() == product).map(|l| l.quantity.value())
    }

    #[tokio::test]
    async fn test_stale_update_is_a_conflict() {
        let Some(store) = store().await else { return };
        let owner = OwnerKey::Guest(GuestId::from(unique("g").as_str()));
        let mut first = cart(owner.clone(), "A", 1);
        store.save(&mut first).await.unwrap();
        assert_eq!(first.version(), 1);

        let mut second = store.find(&owner).await.unwrap().unwrap();
        second.update_quantity(&key_a(), 4).unwrap();
        store.save(&mut second).await.unwrap();
        assert_eq!(second.version(), 2);

        first.update_quantity(&key_a(), 9).unwrap();
        assert!(matches!(store.save(&mut first).await, Err(StoreError::Conflict(_))));
        let stored = store.find(&owner).await.unwrap().unwrap();
        assert_eq!(quantity(&stored, "A"), Some(4));
        assert_eq!(stored.version(), 2);
    }

    #[tokio::test]
    async fn test_second_cart_for_same_owner_is_a_conflict() {
        let Some(store) = store().await else { return };
        let owner = OwnerKey::Guest(GuestId::from(unique("g").as_str()));
        store.save(&mut cart(owner.clone(), "A", 1)).await.unwrap();
        assert!(matches!(store.save(&mut cart(owner.clone(), "B", 1)).await, Err(StoreError::Conflict(_))));
        assert_eq!(quantity(&store.find(&owner).await.unwrap().unwrap(), "A"), Some(1));
    }

    #[tokio::test]
    async fn test_commit_merge_is_atomic() {
        let Some(store) = store().await else { return };
        let guest_key = OwnerKey::Guest(GuestId::from(unique("g").as_str()));
        let user_key = OwnerKey::User(UserId::from(unique("u").as_str()));
        let mut guest_cart = cart(guest_key.clone(), "A", 2);
        let mut user_cart = cart(user_key.clone(), "A", 3);
        store.save(&mut guest_cart).await.unwrap();
        store.save(&mut user_cart).await.unwrap();

        // A stale user cart rolls the whole merge back.
        let mut stale = user_cart.clone();
        let mut newer = store.find(&user_key).await.unwrap().unwrap();
        newer.update_quantity(&key_a(), 7).unwrap();
        store.save(&mut newer).await.unwrap();
        stale.absorb(&guest_cart).unwrap();
        assert!(matches!(store.commit_merge(&mut stale, &guest_cart).await, Err(StoreError::Conflict(_))));
        assert!(store.find(&guest_key).await.unwrap().is_some());
        assert_eq!(quantity(&store.find(&user_key).await.unwrap().unwrap(), "A"), Some(7));

        newer.absorb(&guest_cart).unwrap();
        assert_eq!(store.commit_merge(&mut newer, &guest_cart).await.unwrap(), MergeCommit::GuestDeleted);
        assert!(store.find(&guest_key).await.unwrap().is_none());
        let stored = store.find(&user_key).await.unwrap().unwrap();
        assert_eq!(quantity(&stored, "A"), Some(9));
        assert_eq!(stored.version(), newer.version());
        assert!(stored.absorbed_guests().is_empty());
    }
}
