//! In-process cart store for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CartStore, StoreError};
use crate::domain::{Cart, CartDocument, OwnerKey};

/// Keeps serialized cart documents in memory, indexed by owner key.
#[derive(Default)]
pub struct InMemoryCartStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<Uuid, (CartDocument, u64)>,
    owners: HashMap<OwnerKey, Uuid>,
}

impl InMemoryCartStore {
    pub fn new() -> Self { Self::default() }

    /// Number of stored carts.
    pub async fn len(&self) -> usize { self.inner.read().await.docs.len() }

    pub async fn is_empty(&self) -> bool { self.len().await == 0 }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn find(&self, owner: &OwnerKey) -> Result<Option<Cart>, StoreError> {
        let inner = self.inner.read().await;
        let Some(id) = inner.owners.get(owner) else { return Ok(None) };
        match inner.docs.get(id) {
            Some((doc, version)) => Ok(Some(Cart::from_document(doc.clone(), *version)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, cart: &mut Cart) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let id = cart.id();
        let stored_version = inner.docs.get(&id).map_or(0, |(_, v)| *v);
        if stored_version != cart.version() {
            return Err(StoreError::Conflict(id.to_string()));
        }
        if inner.owners.get(cart.owner()).is_some_and(|owner_of| *owner_of != id) {
            return Err(StoreError::Conflict(id.to_string()));
        }

        inner.owners.retain(|_, cart_id| *cart_id != id);
        inner.owners.insert(cart.owner().clone(), id);
        let version = stored_version + 1;
        inner.docs.insert(id, (cart.to_document(), version));
        cart.mark_persisted(version);
        Ok(())
    }

    async fn delete(&self, owner: &OwnerKey) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(id) = inner.owners.remove(owner) else { return Ok(false) };
        Ok(inner.docs.remove(&id).is_some())
    }
}
