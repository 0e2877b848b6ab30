//! Cart Aggregate

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::events::CartEvent;
use crate::domain::value_objects::{GuestId, LineKey, Money, OwnerKey, ProductId, Quantity, Size, UserId};
use crate::CartError;

/// A running cart owned by exactly one guest or user.
///
/// Lines are kept in insertion order and keyed by (product, size). The total
/// is derived from the lines after every mutation and is never set directly.
#[derive(Clone, Debug)]
pub struct Cart {
    id: Uuid,
    owner: OwnerKey,
    items: IndexMap<LineKey, CartLineItem>,
    total_price: Money,
    absorbed_guests: Vec<AbsorbedGuest>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<CartEvent>,
}

/// One cart line. Name, image and price are a snapshot of the catalog entry
/// taken when the line was first added.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub name: String,
    #[serde(rename = "image", default)]
    pub image_url: Option<String>,
    #[serde(rename = "price")]
    pub unit_price: Money,
    pub size: Size,
    pub quantity: Quantity,
}

impl CartLineItem {
    pub fn key(&self) -> LineKey { LineKey::new(self.product_id.clone(), self.size.clone()) }
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    /// Start a cart for `owner` holding `first` as its only line.
    pub fn create(owner: OwnerKey, first: CartLineItem) -> Self {
        let now = Utc::now();
        let mut cart = Self {
            id: Uuid::now_v7(), owner, items: IndexMap::new(), total_price: Money::zero(),
            absorbed_guests: vec![], version: 0, created_at: now, updated_at: now, events: vec![],
        };
        cart.raise_event(CartEvent::Created { cart_id: cart.id, owner: cart.owner.clone() });
        cart.raise_event(CartEvent::ItemAdded {
            cart_id: cart.id, product_id: first.product_id.clone(), size: first.size.clone(), quantity: first.quantity.value(),
        });
        cart.items.insert(first.key(), first);
        cart.recalculate();
        cart
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn owner(&self) -> &OwnerKey { &self.owner }
    pub fn items(&self) -> impl Iterator<Item = &CartLineItem> { self.items.values() }
    pub fn line(&self, key: &LineKey) -> Option<&CartLineItem> { self.items.get(key) }
    pub fn total_price(&self) -> Money { self.total_price }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Guest carts folded in whose deletion has not been confirmed yet.
    pub fn absorbed_guests(&self) -> &[AbsorbedGuest] { &self.absorbed_guests }
    pub fn has_absorbed(&self, guest_cart_id: Uuid) -> bool { self.absorbed_guests.iter().any(|g| g.cart_id == guest_cart_id) }

    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Store version this cart was read at; 0 when never persisted.
    pub fn version(&self) -> u64 { self.version }

    /// Record the version assigned by a successful store write.
    pub fn mark_persisted(&mut self, version: u64) { self.version = version; }

    /// Add a line, or grow the quantity of the existing (product, size) line.
    /// An existing line keeps its original snapshot.
    pub fn add_item(&mut self, line: CartLineItem) -> Result<(), CartError> {
        let key = line.key();
        let added = line.quantity;
        match self.items.get_mut(&key) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(added).map_err(|_| CartError::InvalidQuantity)?;
            }
            None => { self.items.insert(key.clone(), line); }
        }
        self.raise_event(CartEvent::ItemAdded { cart_id: self.id, product_id: key.product_id, size: key.size, quantity: added.value() });
        self.recalculate();
        Ok(())
    }

    /// Set a line's quantity outright. Zero or less drops the line.
    pub fn update_quantity(&mut self, key: &LineKey, quantity: i64) -> Result<(), CartError> {
        if !self.items.contains_key(key) { return Err(CartError::ItemNotFound(key.clone())); }
        if quantity <= 0 {
            self.remove_item(key)?;
            return Ok(());
        }
        let quantity = Quantity::try_from(quantity).map_err(|_| CartError::InvalidQuantity)?;
        if let Some(item) = self.items.get_mut(key) { item.quantity = quantity; }
        self.raise_event(CartEvent::QuantityChanged {
            cart_id: self.id, product_id: key.product_id.clone(), size: key.size.clone(), quantity: quantity.value(),
        });
        self.recalculate();
        Ok(())
    }

    pub fn remove_item(&mut self, key: &LineKey) -> Result<CartLineItem, CartError> {
        let removed = self.items.shift_remove(key).ok_or_else(|| CartError::ItemNotFound(key.clone()))?;
        self.raise_event(CartEvent::ItemRemoved { cart_id: self.id, product_id: key.product_id.clone(), size: key.size.clone() });
        self.recalculate();
        Ok(removed)
    }

    /// Fold a guest cart's lines into this user cart. Returns how many guest
    /// lines contributed.
    ///
    /// Matching lines have their quantities summed; the rest are appended
    /// with the guest's snapshot. The guest cart stays on record as absorbed
    /// until [`Cart::settle_guest`]; absorbing the same guest cart again only
    /// adds what it gained since the last time.
    pub fn absorb(&mut self, guest: &Cart) -> Result<usize, CartError> {
        let (OwnerKey::User(user_id), OwnerKey::Guest(guest_id)) = (&self.owner, &guest.owner) else {
            return Err(CartError::OwnershipViolation(format!("cannot merge {} into {}", guest.owner, self.owner)));
        };
        let (user_id, guest_id) = (user_id.clone(), guest_id.clone());

        let mut record = self
            .absorbed_guests
            .iter()
            .find(|g| g.cart_id == guest.id)
            .cloned()
            .unwrap_or_else(|| AbsorbedGuest { cart_id: guest.id, lines: vec![] });
        let mut merged = self.items.clone();
        let mut contributed = 0;
        for (key, line) in &guest.items {
            let Ok(extra) = Quantity::new(line.quantity.value().saturating_sub(record.quantity_of(key))) else { continue };
            match merged.get_mut(key) {
                Some(existing) => {
                    existing.quantity = existing.quantity.checked_add(extra).map_err(|_| CartError::InvalidQuantity)?;
                }
                None => { merged.insert(key.clone(), CartLineItem { quantity: extra, ..line.clone() }); }
            }
            record.raise_to(key, line.quantity);
            contributed += 1;
        }
        self.items = merged;
        self.absorbed_guests.retain(|g| g.cart_id != guest.id);
        self.absorbed_guests.push(record);
        if contributed > 0 {
            self.raise_event(CartEvent::Merged { cart_id: self.id, guest_id, user_id, lines: contributed });
        }
        self.recalculate();
        Ok(contributed)
    }

    /// Forget an absorbed guest cart once it is known to be deleted.
    /// Returns whether it was on record.
    pub fn settle_guest(&mut self, guest_cart_id: Uuid) -> bool {
        let before = self.absorbed_guests.len();
        self.absorbed_guests.retain(|g| g.cart_id != guest_cart_id);
        self.absorbed_guests.len() != before
    }

    /// Hand a guest cart over to `user_id`. The guest id is cleared.
    pub fn transfer_to(&mut self, user_id: UserId) -> Result<(), CartError> {
        let OwnerKey::Guest(guest_id) = &self.owner else {
            return Err(CartError::OwnershipViolation(format!("{} is not a guest cart", self.owner)));
        };
        let guest_id = guest_id.clone();
        self.owner = OwnerKey::User(user_id.clone());
        self.raise_event(CartEvent::OwnershipTransferred { cart_id: self.id, guest_id, user_id });
        self.touch();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<CartEvent> { std::mem::take(&mut self.events) }

    pub fn to_document(&self) -> CartDocument {
        CartDocument {
            id: self.id,
            user: self.owner.user_id().cloned(),
            guest_id: self.owner.guest_id().cloned(),
            products: self.items.values().cloned().collect(),
            total_price: self.total_price,
            absorbed_guests: self.absorbed_guests.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Rebuild a cart from its stored document. The stored total is ignored
    /// and derived again from the lines.
    pub fn from_document(doc: CartDocument, version: u64) -> Result<Self, DocumentError> {
        let owner = match (doc.user, doc.guest_id) {
            (Some(user), None) => OwnerKey::User(user),
            (None, Some(guest)) => OwnerKey::Guest(guest),
            (Some(_), Some(_)) => return Err(DocumentError::AmbiguousOwner(doc.id)),
            (None, None) => return Err(DocumentError::MissingOwner(doc.id)),
        };
        let mut items = IndexMap::with_capacity(doc.products.len());
        for line in doc.products {
            let key = line.key();
            if items.insert(key.clone(), line).is_some() { return Err(DocumentError::DuplicateLine(doc.id, key)); }
        }
        let mut cart = Self {
            id: doc.id, owner, items, total_price: Money::zero(), absorbed_guests: doc.absorbed_guests,
            version, created_at: doc.created_at, updated_at: doc.updated_at, events: vec![],
        };
        cart.total_price = cart.items.values().map(CartLineItem::line_total).sum();
        Ok(cart)
    }

    fn recalculate(&mut self) {
        self.total_price = self.items.values().map(CartLineItem::line_total).sum();
        self.touch();
    }

    fn raise_event(&mut self, e: CartEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl Serialize for Cart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { self.to_document().serialize(serializer) }
}

/// Persisted and wire shape of a cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDocument {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<GuestId>,
    pub products: Vec<CartLineItem>,
    pub total_price: Money,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absorbed_guests: Vec<AbsorbedGuest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A guest cart whose lines were folded into a user cart, with the
/// quantities taken from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsorbedGuest {
    pub cart_id: Uuid,
    pub lines: Vec<AbsorbedLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsorbedLine {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: Quantity,
}

impl AbsorbedGuest {
    fn quantity_of(&self, key: &LineKey) -> u32 {
        self.lines
            .iter()
            .find(|l| l.product_id == key.product_id && l.size == key.size)
            .map_or(0, |l| l.quantity.value())
    }

    fn raise_to(&mut self, key: &LineKey, quantity: Quantity) {
        match self.lines.iter_mut().find(|l| l.product_id == key.product_id && l.size == key.size) {
            Some(line) => line.quantity = line.quantity.max(quantity),
            None => self.lines.push(AbsorbedLine { product_id: key.product_id.clone(), size: key.size.clone(), quantity }),
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cart {0} has both a user and a guest owner")]
    AmbiguousOwner(Uuid),
    #[error("cart {0} has no owner")]
    MissingOwner(Uuid),
    #[error("cart {0} holds line {1} twice")]
    DuplicateLine(Uuid, LineKey),
}
