//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Rate limiting on auth routes (governor)
//!
//! Shopper identity is resolved per handler by the extractors in `identity`.

pub mod identity;
pub mod rate_limit;
pub mod request_id;

pub use identity::{Identity, PresentedIdentity, RequireUser, Shopper, bearer_token};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
