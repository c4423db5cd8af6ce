//! Store lookup handler.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::models::Store;
use crate::routes::cart::store_slug;
use crate::state::AppState;

/// Get a store summary by slug.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Store>> {
    let slug = store_slug(&slug)?;

    state
        .store(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Store not found: {slug}")))
}
