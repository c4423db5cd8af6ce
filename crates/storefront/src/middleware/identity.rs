//! Shopper identity extractors.
//!
//! A request identifies its shopper with either an `Authorization: Bearer`
//! token or an `X-Guest-Session-Id` header. When both are present the bearer
//! token wins and the guest header is ignored.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use bazaar_core::{CartOwner, GUEST_SESSION_HEADER, GuestSessionId, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Credentials found in request headers, before any database lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedIdentity {
    /// An `Authorization: Bearer <token>` header.
    Bearer(String),
    /// A guest session header, if one parsed. Malformed ids are dropped so the
    /// shopper is issued a fresh session.
    Guest(Option<GuestSessionId>),
}

impl PresentedIdentity {
    /// Read shopper credentials from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if let Some(token) = bearer_token(headers) {
            return Self::Bearer(token.to_owned());
        }

        let guest = headers
            .get(GUEST_SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| match GuestSessionId::parse(s) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring malformed guest session header");
                    None
                }
            });

        Self::Guest(guest)
    }
}

/// Extract the token from an `Authorization: Bearer` header.
///
/// The scheme is matched case-insensitively; an empty token counts as absent.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The resolved shopper behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shopper {
    /// Authenticated user.
    User(UserId),
    /// Anonymous shopper; `None` until a guest session is issued.
    Guest(Option<GuestSessionId>),
}

impl Shopper {
    /// The cart owner for this shopper, if one is already established.
    #[must_use]
    pub const fn owner(&self) -> Option<CartOwner> {
        match *self {
            Self::User(id) => Some(CartOwner::User(id)),
            Self::Guest(Some(id)) => Some(CartOwner::Guest(id)),
            Self::Guest(None) => None,
        }
    }
}

/// Extractor resolving the request's shopper.
///
/// A bearer token that is unknown or expired rejects the request with 401
/// rather than silently falling back to guest mode.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(Identity(shopper): Identity) -> impl IntoResponse {
///     match shopper {
///         Shopper::User(id) => format!("user {id}"),
///         Shopper::Guest(_) => "guest".to_string(),
///     }
/// }
/// ```
pub struct Identity(pub Shopper);

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match PresentedIdentity::from_headers(&parts.headers) {
            PresentedIdentity::Bearer(token) => {
                let user_id = authenticate(state, &token).await?;
                Ok(Self(Shopper::User(user_id)))
            }
            PresentedIdentity::Guest(guest) => Ok(Self(Shopper::Guest(guest))),
        }
    }
}

/// Extractor that requires an authenticated user.
///
/// Also carries the raw token so logout can revoke it.
pub struct RequireUser {
    pub user_id: UserId,
    pub token: String,
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?
            .to_owned();
        let user_id = authenticate(state, &token).await?;

        Ok(Self { user_id, token })
    }
}

async fn authenticate(state: &AppState, token: &str) -> Result<UserId, AppError> {
    let auth = AuthService::new(
        state.pool(),
        state.token_hasher(),
        state.config().token_ttl,
    );

    let user_id = auth.authenticate(token).await.map_err(|e| match e {
        AuthError::InvalidToken => AppError::Unauthorized("invalid or expired token".to_string()),
        other => AppError::Auth(other),
    })?;

    set_sentry_user(&user_id);
    Ok(user_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(
            bearer_token(&headers(&[("authorization", "Bearer abc123")])),
            Some("abc123")
        );
        assert_eq!(
            bearer_token(&headers(&[("authorization", "bearer   abc123 ")])),
            Some("abc123")
        );
        assert_eq!(bearer_token(&headers(&[("authorization", "Basic abc")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer ")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer")])), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_takes_precedence_over_guest() {
        let guest = GuestSessionId::generate();
        let map = headers(&[
            ("authorization", "Bearer tok"),
            ("x-guest-session-id", &guest.to_string()),
        ]);
        assert_eq!(
            PresentedIdentity::from_headers(&map),
            PresentedIdentity::Bearer("tok".to_string())
        );
    }

    #[test]
    fn test_guest_header() {
        let guest = GuestSessionId::generate();
        let map = headers(&[("x-guest-session-id", &guest.to_string())]);
        assert_eq!(
            PresentedIdentity::from_headers(&map),
            PresentedIdentity::Guest(Some(guest))
        );
    }

    #[test]
    fn test_malformed_guest_header_is_dropped() {
        let map = headers(&[("x-guest-session-id", "not-a-uuid")]);
        assert_eq!(
            PresentedIdentity::from_headers(&map),
            PresentedIdentity::Guest(None)
        );
        assert_eq!(
            PresentedIdentity::from_headers(&HeaderMap::new()),
            PresentedIdentity::Guest(None)
        );
    }

    #[test]
    fn test_shopper_owner() {
        let guest = GuestSessionId::generate();
        assert_eq!(
            Shopper::User(UserId::new(3)).owner(),
            Some(CartOwner::User(UserId::new(3)))
        );
        assert_eq!(
            Shopper::Guest(Some(guest)).owner(),
            Some(CartOwner::Guest(guest))
        );
        assert_eq!(Shopper::Guest(None).owner(), None);
    }
}
