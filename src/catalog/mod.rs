//! Product lookup.
//!
//! The catalog is owned elsewhere; the cart only reads the fields it
//! snapshots onto a new line.

mod postgres;

pub use postgres::PgProductCatalog;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::{CartLineItem, Money, ProductId, Quantity, Size};
use crate::store::StoreError;

/// The catalog fields copied onto a cart line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub name: String,
    pub unit_price: Money,
    pub primary_image_url: Option<String>,
}

impl ProductSnapshot {
    pub fn into_line(self, product_id: ProductId, size: Size, quantity: Quantity) -> CartLineItem {
        CartLineItem { product_id, name: self.name, image_url: self.primary_image_url, unit_price: self.unit_price, size, quantity }
    }
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns `None` when the product does not exist or is not for sale.
    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, StoreError>;
}

/// Fixed product table held in memory.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductSnapshot>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self { Self::default() }

    pub async fn insert(&self, id: ProductId, product: ProductSnapshot) {
        self.products.write().await.insert(id, product);
    }

    pub async fn remove(&self, id: &ProductId) -> Option<ProductSnapshot> {
        self.products.write().await.remove(id)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        Ok(self.products.read().await.get(id).cloned())
    }
}
