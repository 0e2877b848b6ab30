//! Cart mutation engine.
//!
//! Every operation is a read-modify-write against the [`CartStore`], run
//! while holding the owner's key lock. Merge holds both the guest and the
//! user key.

mod locks;

pub use locks::{KeyGuard, KeyLocks};

use std::sync::Arc;

use tracing::instrument;

use crate::catalog::ProductCatalog;
use crate::domain::{Cart, GuestId, LineKey, OwnerKey, ProductId, Quantity, Size, UserId};
use crate::publisher::{EventPublisher, LogPublisher};
use crate::store::{CartStore, MergeCommit};
use crate::{CartError, Result};

/// Result of an add: the cart and whether this add created it.
#[derive(Debug)]
pub struct AddOutcome {
    pub cart: Cart,
    pub created: bool,
}

pub struct CartEngine {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    publisher: Arc<dyn EventPublisher>,
    locks: KeyLocks,
}

impl CartEngine {
    pub fn new(store: Arc<dyn CartStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { store, catalog, publisher: Arc::new(LogPublisher), locks: KeyLocks::new() }
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Look up the cart for whichever identifiers the caller has. A user id
    /// takes precedence over a guest id. `None` means no cart yet.
    #[instrument(skip(self))]
    pub async fn resolve(&self, user_id: Option<UserId>, guest_id: Option<GuestId>) -> Result<Option<Cart>> {
        let Some(owner) = OwnerKey::from_parts(user_id, guest_id) else { return Ok(None) };
        self.find(&owner).await
    }

    pub async fn find(&self, owner: &OwnerKey) -> Result<Option<Cart>> {
        Ok(self.store.find(owner).await?)
    }

    /// Add `quantity` of (product, size). Creates the cart on first add.
    #[instrument(skip_all, fields(owner = %owner, product = %product_id, size = %size, quantity = quantity))]
    pub async fn add_item(&self, owner: &OwnerKey, product_id: &ProductId, size: &Size, quantity: i64) -> Result<AddOutcome> {
        let quantity = Quantity::try_from(quantity).map_err(|_| CartError::InvalidQuantity)?;
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| CartError::ProductNotFound(product_id.clone()))?;
        let line = product.into_line(product_id.clone(), size.clone(), quantity);

        let _guard = self.locks.lock(owner).await;
        let (mut cart, created) = match self.store.find(owner).await? {
            Some(mut cart) => {
                cart.add_item(line)?;
                (cart, false)
            }
            None => (Cart::create(owner.clone(), line), true),
        };
        self.store.save(&mut cart).await?;
        tracing::debug!(cart = %cart.id(), created, total = %cart.total_price(), "item added");
        self.publish(&mut cart).await;
        Ok(AddOutcome { cart, created })
    }

    /// Set the quantity of an existing line. Zero or less removes it.
    #[instrument(skip_all, fields(owner = %owner, product = %product_id, size = %size, quantity = quantity))]
    pub async fn update_item(&self, owner: &OwnerKey, product_id: &ProductId, size: &Size, quantity: i64) -> Result<Cart> {
        let key = LineKey::new(product_id.clone(), size.clone());
        self.mutate(owner, |cart| cart.update_quantity(&key, quantity)).await
    }

    #[instrument(skip_all, fields(owner = %owner, product = %product_id, size = %size))]
    pub async fn remove_item(&self, owner: &OwnerKey, product_id: &ProductId, size: &Size) -> Result<Cart> {
        let key = LineKey::new(product_id.clone(), size.clone());
        self.mutate(owner, |cart| cart.remove_item(&key).map(drop)).await
    }

    /// Fold the guest cart into the user cart on login.
    ///
    /// - no guest cart: the user cart is returned as is (a retried merge lands here)
    /// - empty guest cart: [`CartError::EmptyGuestCart`], nothing changes,
    ///   unless the user cart already absorbed it
    /// - no user cart: the guest cart is handed over to the user
    /// - both: lines are summed into the user cart and the guest cart is deleted
    #[instrument(skip_all, fields(guest = %guest_id, user = %user_id))]
    pub async fn merge(&self, guest_id: &GuestId, user_id: &UserId) -> Result<Cart> {
        let guest_key = OwnerKey::Guest(guest_id.clone());
        let user_key = OwnerKey::User(user_id.clone());
        let _guard = self.locks.lock_all([&guest_key, &user_key]).await;

        let guest_cart = self.store.find(&guest_key).await?;
        let user_cart = self.store.find(&user_key).await?;

        let Some(guest_cart) = guest_cart else {
            return user_cart.ok_or(CartError::NothingToMerge);
        };

        // A guest cart the user cart already absorbed only contributes what
        // it gained since, and is deleted even when empty.
        let absorbed_before = user_cart.as_ref().is_some_and(|c| c.has_absorbed(guest_cart.id()));
        if guest_cart.is_empty() && !absorbed_before {
            return Err(CartError::EmptyGuestCart);
        }

        let mut cart = match user_cart {
            None => {
                let mut cart = guest_cart;
                cart.transfer_to(user_id.clone())?;
                self.store.save(&mut cart).await?;
                tracing::info!(cart = %cart.id(), "guest cart transferred to user");
                cart
            }
            Some(mut user_cart) => {
                let contributed = user_cart.absorb(&guest_cart)?;
                let commit = self.store.commit_merge(&mut user_cart, &guest_cart).await?;
                tracing::info!(
                    cart = %user_cart.id(),
                    contributed,
                    absorbed_before,
                    guest_deleted = commit == MergeCommit::GuestDeleted,
                    "guest cart merged"
                );
                user_cart
            }
        };
        self.publish(&mut cart).await;
        Ok(cart)
    }

    /// Shared read-modify-write for operations on an existing cart.
    async fn mutate<F>(&self, owner: &OwnerKey, change: F) -> Result<Cart>
    where
        F: FnOnce(&mut Cart) -> Result<()> + Send,
    {
        let _guard = self.locks.lock(owner).await;
        let mut cart = self.store.find(owner).await?.ok_or(CartError::CartNotFound)?;
        change(&mut cart)?;
        self.store.save(&mut cart).await?;
        tracing::debug!(cart = %cart.id(), lines = cart.item_count(), total = %cart.total_price(), "cart updated");
        self.publish(&mut cart).await;
        Ok(cart)
    }

    async fn publish(&self, cart: &mut Cart) {
        for event in cart.take_events() {
            self.publisher.publish(&event).await;
        }
    }
}
