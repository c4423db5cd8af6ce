//! Cart wire types.
//!
//! The backend owns the cart aggregate. These types are the shape it returns
//! on every cart response; clients replace their local snapshot with the
//! latest value wholesale and never patch it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::guest::GuestSessionId;
use super::id::{CartId, CartItemId, ProductId, StoreId, UserId};
use super::money::{CurrencyCode, Price};

/// Who a cart belongs to.
///
/// A cart is owned by exactly one of a registered user or a guest session,
/// never both and never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    /// Authenticated shopper.
    User(UserId),
    /// Anonymous shopper identified by a guest session.
    Guest(GuestSessionId),
}

impl CartOwner {
    /// The owning guest session, if this is a guest cart.
    #[must_use]
    pub const fn guest_session_id(&self) -> Option<GuestSessionId> {
        match self {
            Self::User(_) => None,
            Self::Guest(id) => Some(*id),
        }
    }
}

/// Error returned when a quantity is not a positive integer.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("quantity must be at least 1 (got {0})")]
pub struct QuantityError(pub i64);

/// A positive line-item quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// The largest quantity a single line can hold.
    pub const MAX: u32 = 9_999;

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError`] if `value` is zero, negative, or above [`Self::MAX`].
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        u32::try_from(value)
            .ok()
            .filter(|v| (1..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(QuantityError(value))
    }

    /// Get the quantity as a `u32`.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl From<Quantity> for i32 {
    fn from(quantity: Quantity) -> Self {
        // MAX fits comfortably in i32
        Self::try_from(quantity.0).unwrap_or(Self::MAX)
    }
}

/// A line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    /// Unit price captured when the product was added.
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl CartItem {
    /// Build a line, computing its total from quantity and unit price.
    #[must_use]
    pub fn new(
        id: CartItemId,
        product_id: ProductId,
        product_name: String,
        quantity: Quantity,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id,
            product_id,
            product_name,
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity.get()),
        }
    }
}

/// The cart aggregate as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub store_id: StoreId,
    pub owner: CartOwner,
    pub currency: CurrencyCode,
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub grand_total: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Assemble a cart from its lines, deriving subtotal and grand total.
    ///
    /// The grand total never goes below zero, even if the discount exceeds
    /// the subtotal.
    #[must_use]
    pub fn assemble(
        id: CartId,
        store_id: StoreId,
        owner: CartOwner,
        currency: CurrencyCode,
        items: Vec<CartItem>,
        discount_amount: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let subtotal: Decimal = items.iter().map(|item| item.line_total).sum();
        let grand_total = (subtotal - discount_amount).max(Decimal::ZERO);

        Self {
            id,
            store_id,
            owner,
            currency,
            items,
            subtotal,
            discount_amount,
            grand_total,
            updated_at,
        }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity.get()).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find the line for a product, if present.
    #[must_use]
    pub fn line_for(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Subtotal as a displayable price.
    #[must_use]
    pub const fn subtotal_price(&self) -> Price {
        Price::new(self.subtotal, self.currency)
    }

    /// Grand total as a displayable price.
    #[must_use]
    pub const fn grand_total_price(&self) -> Price {
        Price::new(self.grand_total, self.currency)
    }
}

/// Response body of every cart endpoint.
///
/// `guest_session_id` is set whenever the cart is owned by a guest so the
/// client can persist the (possibly newly issued) id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEnvelope {
    pub cart: Cart,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_session_id: Option<GuestSessionId>,
}

impl From<Cart> for CartEnvelope {
    fn from(cart: Cart) -> Self {
        Self {
            guest_session_id: cart.owner.guest_session_id(),
            cart,
        }
    }
}
