//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod guest;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use cart::{Cart, CartEnvelope, CartItem, CartOwner, Quantity, QuantityError};
pub use email::{Email, EmailError};
pub use guest::{GUEST_SESSION_HEADER, GuestSessionId, GuestSessionIdError};
pub use id::*;
pub use money::{CurrencyCode, Price};
pub use slug::{RESERVED_SEGMENTS, StoreSlug, StoreSlugError};
pub use status::*;
