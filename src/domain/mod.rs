//! Cart domain: aggregate, value objects and events.
pub mod aggregates;
pub mod events;
pub mod value_objects;

pub use aggregates::{AbsorbedGuest, AbsorbedLine, Cart, CartDocument, CartLineItem, DocumentError};
pub use events::CartEvent;
pub use value_objects::{GuestId, LineKey, Money, OwnerKey, ProductId, Quantity, QuantityError, Size, UserId};
