//! Cart route handlers.
//!
//! Every handler answers with the full cart snapshot wrapped in a
//! [`CartEnvelope`]; guest responses also carry the guest session id in the
//! `X-Guest-Session-Id` header.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{
    CartEnvelope, CartItemId, GUEST_SESSION_HEADER, GuestSessionId, ProductId, Quantity,
    StoreSlug,
};

use crate::error::{AppError, Result};
use crate::middleware::{Identity, RequireUser};
use crate::services::CartService;
use crate::state::AppState;

/// Response for cart endpoints.
pub struct CartResponse(pub CartEnvelope);

impl IntoResponse for CartResponse {
    fn into_response(self) -> Response {
        let guest = self.0.guest_session_id;
        let mut response = Json(self.0).into_response();

        if let Some(guest_id) = guest
            && let Ok(value) = HeaderValue::from_str(&guest_id.to_string())
        {
            response.headers_mut().insert(GUEST_SESSION_HEADER, value);
        }

        response
    }
}

/// Request body for adding to cart.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

const fn default_quantity() -> i64 {
    1
}

/// Request body for updating a line's quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Request body for merging a guest cart.
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub guest_session_id: GuestSessionId,
}

/// Parse a store slug from the path; a malformed slug can name no store.
pub(crate) fn store_slug(raw: &str) -> Result<StoreSlug> {
    StoreSlug::parse(raw).map_err(|_| AppError::NotFound(format!("Store not found: {raw}")))
}

fn quantity(raw: i64) -> Result<Quantity> {
    Quantity::new(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Get the current cart.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Identity(shopper): Identity,
) -> Result<CartResponse> {
    let slug = store_slug(&slug)?;
    let envelope = CartService::new(&state).current(&slug, shopper).await?;
    Ok(CartResponse(envelope))
}

/// Add a product to the cart.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Identity(shopper): Identity,
    Json(body): Json<AddItemRequest>,
) -> Result<CartResponse> {
    let slug = store_slug(&slug)?;
    let quantity = quantity(body.quantity)?;

    let envelope = CartService::new(&state)
        .add_item(&slug, shopper, body.product_id, quantity)
        .await?;
    Ok(CartResponse(envelope))
}

/// Set a line's quantity.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    Path((slug, item_id)): Path<(String, i32)>,
    Identity(shopper): Identity,
    Json(body): Json<UpdateItemRequest>,
) -> Result<CartResponse> {
    let slug = store_slug(&slug)?;
    let quantity = quantity(body.quantity)?;

    let envelope = CartService::new(&state)
        .update_item(&slug, shopper, CartItemId::new(item_id), quantity)
        .await?;
    Ok(CartResponse(envelope))
}

/// Remove a line from the cart.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path((slug, item_id)): Path<(String, i32)>,
    Identity(shopper): Identity,
) -> Result<CartResponse> {
    let slug = store_slug(&slug)?;

    let envelope = CartService::new(&state)
        .remove_item(&slug, shopper, CartItemId::new(item_id))
        .await?;
    Ok(CartResponse(envelope))
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Identity(shopper): Identity,
) -> Result<CartResponse> {
    let slug = store_slug(&slug)?;
    let envelope = CartService::new(&state).clear(&slug, shopper).await?;
    Ok(CartResponse(envelope))
}

/// Merge a guest session's carts into the authenticated user's carts.
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn merge(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    user: RequireUser,
    Json(body): Json<MergeRequest>,
) -> Result<CartResponse> {
    let slug = store_slug(&slug)?;

    let envelope = CartService::new(&state)
        .merge(&slug, user.user_id, body.guest_session_id)
        .await?;
    Ok(CartResponse(envelope))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use bazaar_core::{Cart, CartId, CartOwner, CurrencyCode, StoreId};

    use super::*;

    fn empty_cart(owner: CartOwner) -> Cart {
        Cart::assemble(
            CartId::new(1),
            StoreId::new(1),
            owner,
            CurrencyCode::USD,
            Vec::new(),
            Decimal::ZERO,
            Utc::now(),
        )
    }

    #[test]
    fn test_guest_response_carries_header() {
        let guest = GuestSessionId::generate();
        let response = CartResponse(CartEnvelope::from(empty_cart(CartOwner::Guest(guest))))
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(GUEST_SESSION_HEADER).unwrap(),
            guest.to_string().as_str()
        );
    }

    #[test]
    fn test_user_response_has_no_guest_header() {
        let owner = CartOwner::User(bazaar_core::UserId::new(5));
        let response = CartResponse(CartEnvelope::from(empty_cart(owner))).into_response();
        assert!(response.headers().get(GUEST_SESSION_HEADER).is_none());
    }

    #[test]
    fn test_quantity_validation() {
        assert!(matches!(quantity(0), Err(AppError::BadRequest(_))));
        assert!(matches!(quantity(-3), Err(AppError::BadRequest(_))));
        assert_eq!(quantity(2).unwrap().get(), 2);
    }

    #[test]
    fn test_malformed_slug_is_not_found() {
        assert!(matches!(store_slug("Bad Slug"), Err(AppError::NotFound(_))));
        assert!(matches!(store_slug("api"), Err(AppError::NotFound(_))));
        assert_eq!(store_slug("acme").unwrap().as_str(), "acme");
    }

    #[test]
    fn test_add_request_defaults_quantity() {
        let body: AddItemRequest = serde_json::from_str(r#"{"product_id": 4}"#).unwrap();
        assert_eq!(body.product_id, ProductId::new(4));
        assert_eq!(body.quantity, 1);
    }
}
