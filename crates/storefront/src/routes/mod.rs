//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                  - Liveness
//! GET    /health/ready                            - Readiness (database)
//!
//! # Stores
//! GET    /api/stores/{slug}                       - Store summary
//!
//! # Cart (bearer token or X-Guest-Session-Id)
//! GET    /api/stores/{slug}/cart                  - Current cart
//! DELETE /api/stores/{slug}/cart                  - Empty the cart
//! POST   /api/stores/{slug}/cart/items            - Add product
//! PATCH  /api/stores/{slug}/cart/items/{item_id}  - Set quantity
//! DELETE /api/stores/{slug}/cart/items/{item_id}  - Remove line
//! POST   /api/stores/{slug}/cart/merge            - Merge guest cart (bearer required)
//!
//! # Auth
//! POST   /api/auth/register                       - Create account
//! POST   /api/auth/login                          - Issue access token
//! POST   /api/auth/logout                         - Revoke access token
//! GET    /api/auth/me                             - Current user
//! ```

pub mod auth;
pub mod cart;
pub mod stores;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(auth_rate_limiter())
}

/// Create the store and cart routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/{slug}", get(stores::show))
        .route("/{slug}/cart", get(cart::show).delete(cart::clear))
        .route("/{slug}/cart/items", post(cart::add))
        .route(
            "/{slug}/cart/items/{item_id}",
            patch(cart::update).delete(cart::remove),
        )
        .route("/{slug}/cart/merge", post(cart::merge))
        .layer(api_rate_limiter())
}

/// Create the main application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/stores", store_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
