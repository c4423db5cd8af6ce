//! Account route handlers.
//!
//! Registration, password login (issuing a bearer token), logout (revoking
//! it), and the current-user lookup.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bazaar_core::UserId;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::User;
use crate::services::{AuthService, IssuedToken};
use crate::state::AppState;

/// Credentials body for login and registration.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Public view of an account.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.as_str().to_owned(),
            created_at: user.created_at,
        }
    }
}

fn auth_service(state: &AppState) -> AuthService<'_> {
    AuthService::new(
        state.pool(),
        state.token_hasher(),
        state.config().token_ttl,
    )
}

/// Create an account.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = auth_service(&state)
        .register(&body.email, &body.password)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Exchange credentials for an access token.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<IssuedToken>> {
    let (_, token) = auth_service(&state)
        .login(&body.email, &body.password)
        .await?;

    Ok(Json(token))
}

/// Revoke the presented access token.
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn logout(State(state): State<AppState>, user: RequireUser) -> Result<StatusCode> {
    auth_service(&state).logout(&user.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get the authenticated user.
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn me(State(state): State<AppState>, user: RequireUser) -> Result<Json<UserResponse>> {
    let user = auth_service(&state).get_user(user.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}
