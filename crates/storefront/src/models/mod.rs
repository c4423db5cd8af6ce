//! Domain models for the storefront backend.
//!
//! Row types live next to their repositories in `db`; these are the
//! validated shapes handed to services and handlers.

pub mod store;
pub mod user;

pub use store::{Product, Store};
pub use user::User;
