//! Domain events
use crate::domain::value_objects::{GuestId, OwnerKey, ProductId, Size, UserId};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    Created { cart_id: Uuid, owner: OwnerKey },
    ItemAdded { cart_id: Uuid, product_id: ProductId, size: Size, quantity: u32 },
    QuantityChanged { cart_id: Uuid, product_id: ProductId, size: Size, quantity: u32 },
    ItemRemoved { cart_id: Uuid, product_id: ProductId, size: Size },
    OwnershipTransferred { cart_id: Uuid, guest_id: GuestId, user_id: UserId },
    Merged { cart_id: Uuid, guest_id: GuestId, user_id: UserId, lines: usize },
}

impl CartEvent {
    /// Subject suffix used when the event leaves the process.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::ItemAdded { .. } => "item_added",
            Self::QuantityChanged { .. } => "quantity_changed",
            Self::ItemRemoved { .. } => "item_removed",
            Self::OwnershipTransferred { .. } => "ownership_transferred",
            Self::Merged { .. } => "merged",
        }
    }

    pub fn cart_id(&self) -> Uuid {
        match self {
            Self::Created { cart_id, .. }
            | Self::ItemAdded { cart_id, .. }
            | Self::QuantityChanged { cart_id, .. }
            | Self::ItemRemoved { cart_id, .. }
            | Self::OwnershipTransferred { cart_id, .. }
            | Self::Merged { cart_id, .. } => *cart_id,
        }
    }
}
