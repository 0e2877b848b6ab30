//! Product lookup against the storefront `products` table.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{ProductCatalog, ProductSnapshot};
use crate::domain::{Money, ProductId};
use crate::store::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    name: String,
    price: Decimal,
    image: Option<String>,
}

pub struct PgProductCatalog {
    pool: PgPool,
}

impl PgProductCatalog {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        // Postgres arrays are 1-based; images[1] is NULL for an empty array.
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT name, price, images[1] AS image FROM products WHERE id = $1 AND status = 'active'",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ProductSnapshot { name: r.name, unit_price: Money::new(r.price), primary_image_url: r.image }))
    }
}
