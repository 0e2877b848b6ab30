//! Value Objects for the cart domain

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Defines a string-backed identifier newtype.
///
/// Ids are opaque to the cart: they are compared byte-for-byte and never
/// normalized.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
            pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self { Self(value.to_string()) }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self { Self(value) }
        }
    };
}

string_id!(
    /// Catalog product identifier.
    ProductId
);
string_id!(
    /// Authenticated customer identifier.
    UserId
);
string_id!(
    /// Anonymous session identifier, issued once per guest session.
    GuestId
);
string_id!(
    /// Product size label ("M", "XL", ...). Different sizes are different lines.
    Size
);

impl GuestId {
    /// Mint a fresh guest identifier.
    pub fn generate() -> Self { Self(format!("guest_{}", Uuid::now_v7().simple())) }
}

/// Who a cart belongs to. Exactly one owner at a time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum OwnerKey {
    User(UserId),
    Guest(GuestId),
}

impl OwnerKey {
    /// Pick the lookup key from whatever identifiers the caller sent.
    /// A user id wins over a guest id.
    pub fn from_parts(user_id: Option<UserId>, guest_id: Option<GuestId>) -> Option<Self> {
        match (user_id, guest_id) {
            (Some(user), _) => Some(Self::User(user)),
            (None, Some(guest)) => Some(Self::Guest(guest)),
            (None, None) => None,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self { Self::User(id) => Some(id), Self::Guest(_) => None }
    }

    pub fn guest_id(&self) -> Option<&GuestId> {
        match self { Self::Guest(id) => Some(id), Self::User(_) => None }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(id) => write!(f, "guest:{id}"),
        }
    }
}

/// Identity of a cart line: one line per (product, size).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: Size,
}

impl LineKey {
    pub fn new(product_id: ProductId, size: Size) -> Self { Self { product_id, size } }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}", self.product_id, self.size) }
}

/// Money value object. Single store currency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn zero() -> Self { Self(Decimal::ZERO) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn add(&self, other: &Money) -> Money { Money(self.0 + other.0) }
    pub fn multiply(&self, qty: Quantity) -> Money { Money(self.0 * Decimal::from(qty.value())) }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::zero(), |acc, m| acc.add(&m)) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Line quantity. Always positive; a line at zero does not exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::NotPositive); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn checked_add(&self, other: Quantity) -> Result<Self, QuantityError> {
        self.0.checked_add(other.0).map(Self).ok_or(QuantityError::Overflow)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 { return Err(QuantityError::NotPositive); }
        u32::try_from(value).map_err(|_| QuantityError::Overflow).and_then(Self::new)
    }
}

impl From<Quantity> for u32 {
    fn from(qty: Quantity) -> Self { qty.0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { NotPositive, Overflow }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::NotPositive => write!(f, "quantity must be positive"), Self::Overflow => write!(f, "quantity too large") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_key_prefers_user() {
        let key = OwnerKey::from_parts(Some(UserId::from("u1")), Some(GuestId::from("g1")));
        assert_eq!(key, Some(OwnerKey::User(UserId::from("u1"))));
        let key = OwnerKey::from_parts(None, Some(GuestId::from("g1")));
        assert_eq!(key, Some(OwnerKey::Guest(GuestId::from("g1"))));
        assert_eq!(OwnerKey::from_parts(None, None), None);
    }

    #[test]
    fn test_generated_guest_ids_are_unique() {
        let a = GuestId::generate();
        let b = GuestId::generate();
        assert!(a.as_str().starts_with("guest_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_quantity_rejects_non_positive() {
        assert_eq!(Quantity::try_from(0_i64), Err(QuantityError::NotPositive));
        assert_eq!(Quantity::try_from(-3_i64), Err(QuantityError::NotPositive));
        assert_eq!(Quantity::try_from(i64::from(u32::MAX) + 1), Err(QuantityError::Overflow));
        assert_eq!(Quantity::try_from(4_i64).unwrap().value(), 4);
    }

    #[test]
    fn test_quantity_checked_add() {
        let a = Quantity::new(2).unwrap();
        assert_eq!(a.checked_add(Quantity::new(3).unwrap()).unwrap().value(), 5);
        assert_eq!(Quantity::new(u32::MAX).unwrap().checked_add(a), Err(QuantityError::Overflow));
    }

    #[test]
    fn test_money_sum_of_nothing_is_zero() {
        let total: Money = Vec::<Money>::new().into_iter().sum();
        assert_eq!(total, Money::zero());
        let line = Money::new(Decimal::new(1999, 2)).multiply(Quantity::new(3).unwrap());
        assert_eq!(line.amount(), Decimal::new(5997, 2));
    }
}
