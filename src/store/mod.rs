//! Cart persistence.
//!
//! A [`CartStore`] keeps one document per cart, addressable by its current
//! owner key. Writes carry the version the cart was read at, so a store shared
//! by several processes rejects lost updates with [`StoreError::Conflict`].

mod memory;
mod postgres;

pub use memory::InMemoryCartStore;
pub use postgres::PgCartStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Cart, DocumentError, OwnerKey};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cart {0} was modified concurrently")]
    Conflict(String),

    #[error("invalid cart document: {0}")]
    InvalidDocument(#[from] DocumentError),

    #[error("invalid stored version {0}")]
    InvalidVersion(i64),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// What happened to the guest cart when a merge was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeCommit {
    GuestDeleted,
    /// The user cart was written but the guest cart could not be removed.
    GuestRetained,
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Point lookup by owner key.
    async fn find(&self, owner: &OwnerKey) -> Result<Option<Cart>, StoreError>;

    /// Insert or update `cart` under its current owner key and record the new
    /// version on it.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the stored version moved or the owner key belongs to another cart
    async fn save(&self, cart: &mut Cart) -> Result<(), StoreError>;

    /// Delete the cart addressed by `owner`. Returns whether one existed.
    async fn delete(&self, owner: &OwnerKey) -> Result<bool, StoreError>;

    /// Persist a merged user cart and drop the guest cart it absorbed.
    ///
    /// The default writes the user cart, still recording the guest cart as
    /// absorbed, then deletes the guest cart on a best-effort basis. A failed
    /// delete is logged and reported as [`MergeCommit::GuestRetained`]; the
    /// record stays so the next merge does not count the same lines twice.
    /// After a successful delete the record is cleared with a second write.
    /// Stores with transactions override this to make both writes atomic.
    async fn commit_merge(&self, user_cart: &mut Cart, guest_cart: &Cart) -> Result<MergeCommit, StoreError> {
        self.save(user_cart).await?;
        if let Err(error) = self.delete(guest_cart.owner()).await {
            tracing::warn!(
                %error,
                guest_cart = %guest_cart.id(),
                user_cart = %user_cart.id(),
                "merged cart saved but guest cart was not deleted"
            );
            return Ok(MergeCommit::GuestRetained);
        }
        if user_cart.settle_guest(guest_cart.id()) {
            if let Err(error) = self.save(user_cart).await {
                tracing::warn!(%error, user_cart = %user_cart.id(), "absorbed guest record not cleared");
            }
        }
        Ok(MergeCommit::GuestDeleted)
    }
}
