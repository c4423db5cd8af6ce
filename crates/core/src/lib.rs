//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `storefront` - REST backend that owns carts, stores and accounts
//! - `client` - Session and cart reconciliation library for shoppers
//! - `cli` - Command-line tools for migrations, seeding and cart access
//!
//! # Architecture
//!
//! The core crate contains only types and pure computations - no I/O, no
//! database access, no HTTP clients. The cart wire types defined here are
//! what the backend serializes and what the client deserializes, so both
//! sides agree on a single shape.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, store slugs, guest session IDs, money, carts
//!   and schema enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
