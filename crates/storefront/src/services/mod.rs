//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password accounts and bearer access tokens
//! - `cart` - Cart reads, mutations, and guest-to-user merge

pub mod auth;
pub mod cart;

pub use auth::{AuthError, AuthService, IssuedToken, TokenHasher};
pub use cart::{CartError, CartService};
