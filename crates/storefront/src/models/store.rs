//! Tenant and catalog domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use bazaar_core::{CurrencyCode, ProductId, StoreId, StoreSlug};

/// A tenant storefront.
#[derive(Debug, Clone, Serialize)]
pub struct Store {
    pub id: StoreId,
    pub slug: StoreSlug,
    pub name: String,
    pub currency: CurrencyCode,
}

/// A product sold by a store.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    /// Current price; copied onto cart lines when added.
    pub price: Decimal,
    pub active: bool,
}
