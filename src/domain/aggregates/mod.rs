//! Aggregates module
pub mod cart;

pub use cart::{AbsorbedGuest, AbsorbedLine, Cart, CartDocument, CartLineItem, DocumentError};
