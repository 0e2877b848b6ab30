//! Storefront Cart Service
//!
//! Carts shared between anonymous ("guest") and signed-in sessions.
//!
//! ## Features
//! - Add, update and remove cart lines keyed by (product, size)
//! - Catalog snapshot taken when a line is first added
//! - Guest cart merged into the user cart on login
//! - Per-owner serialization of read-modify-write cycles
//! - Cart events published to NATS

pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod publisher;
pub mod store;

use thiserror::Error;

use crate::domain::{LineKey, ProductId};
use crate::store::StoreError;

pub use crate::engine::{AddOutcome, CartEngine};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CartError {
    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Cart not found")]
    CartNotFound,

    #[error("Product not found in cart: {0}")]
    ItemNotFound(LineKey),

    #[error("Guest cart is empty")]
    EmptyGuestCart,

    #[error("No cart to merge")]
    NothingToMerge,

    #[error("Cart was modified concurrently")]
    Conflict,

    #[error("Ownership violation: {0}")]
    OwnershipViolation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl From<StoreError> for CartError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(_) => Self::Conflict,
            other => Self::StoreUnavailable(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CartError>;
