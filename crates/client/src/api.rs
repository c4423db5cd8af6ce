//! Typed HTTP client for the storefront REST API.
//!
//! Thin wrappers over the `/api` endpoints. Every cart call takes the
//! [`RequestIdentity`] to present; nothing here holds session state.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use bazaar_core::{
    CartEnvelope, CartItemId, CurrencyCode, GUEST_SESSION_HEADER, GuestSessionId, ProductId,
    StoreId, StoreSlug, UserId,
};

use crate::auth::AccessToken;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::identity::RequestIdentity;

/// Store summary returned by `GET /api/stores/{slug}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreSummary {
    pub id: StoreId,
    pub slug: StoreSlug,
    pub name: String,
    pub currency: CurrencyCode,
}

/// Account returned by registration and `GET /api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct AddItemBody {
    product_id: ProductId,
    quantity: u32,
}

#[derive(Serialize)]
struct UpdateItemBody {
    quantity: u32,
}

#[derive(Serialize)]
struct MergeBody {
    guest_session_id: GuestSessionId,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Storefront API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    /// Create a client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|source| ClientError::Http {
                endpoint: "client".to_string(),
                source,
            })?;

        let mut base = config.api_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { http, base })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    fn cart_path(slug: &StoreSlug, rest: &str) -> String {
        format!("api/stores/{slug}/cart{rest}")
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Fetch the current cart.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, slug, identity), fields(store = %slug))]
    pub async fn get_cart(
        &self,
        slug: &StoreSlug,
        identity: &RequestIdentity,
    ) -> Result<CartEnvelope, ClientError> {
        let endpoint = Self::cart_path(slug, "");
        let request = identity.apply(self.http.get(self.url(&endpoint)?));
        self.send_json(&endpoint, request).await
    }

    /// Add a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, slug, identity), fields(store = %slug))]
    pub async fn add_item(
        &self,
        slug: &StoreSlug,
        identity: &RequestIdentity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartEnvelope, ClientError> {
        let endpoint = Self::cart_path(slug, "/items");
        let request = identity
            .apply(self.http.post(self.url(&endpoint)?))
            .json(&AddItemBody {
                product_id,
                quantity,
            });
        self.send_json(&endpoint, request).await
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, slug, identity), fields(store = %slug))]
    pub async fn update_item(
        &self,
        slug: &StoreSlug,
        identity: &RequestIdentity,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartEnvelope, ClientError> {
        let endpoint = Self::cart_path(slug, &format!("/items/{item_id}"));
        let request = identity
            .apply(self.http.patch(self.url(&endpoint)?))
            .json(&UpdateItemBody { quantity });
        self.send_json(&endpoint, request).await
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, slug, identity), fields(store = %slug))]
    pub async fn remove_item(
        &self,
        slug: &StoreSlug,
        identity: &RequestIdentity,
        item_id: CartItemId,
    ) -> Result<CartEnvelope, ClientError> {
        let endpoint = Self::cart_path(slug, &format!("/items/{item_id}"));
        let request = identity.apply(self.http.delete(self.url(&endpoint)?));
        self.send_json(&endpoint, request).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, slug, identity), fields(store = %slug))]
    pub async fn clear_cart(
        &self,
        slug: &StoreSlug,
        identity: &RequestIdentity,
    ) -> Result<CartEnvelope, ClientError> {
        let endpoint = Self::cart_path(slug, "");
        let request = identity.apply(self.http.delete(self.url(&endpoint)?));
        self.send_json(&endpoint, request).await
    }

    /// Merge a guest session's carts into the authenticated user's carts.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, slug, token), fields(store = %slug))]
    pub async fn merge_guest_cart(
        &self,
        slug: &StoreSlug,
        token: &AccessToken,
        guest_session_id: GuestSessionId,
    ) -> Result<CartEnvelope, ClientError> {
        let endpoint = Self::cart_path(slug, "/merge");
        let request = self
            .http
            .post(self.url(&endpoint)?)
            .bearer_auth(token.secret().expose_secret())
            .json(&MergeBody { guest_session_id });
        self.send_json(&endpoint, request).await
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// Fetch a store summary.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, slug), fields(store = %slug))]
    pub async fn get_store(&self, slug: &StoreSlug) -> Result<StoreSummary, ClientError> {
        let endpoint = format!("api/stores/{slug}");
        let request = self.http.get(self.url(&endpoint)?);
        self.send_json(&endpoint, request).await
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let endpoint = "api/auth/register";
        let request = self
            .http
            .post(self.url(endpoint)?)
            .json(&Credentials { email, password });
        self.send_json(endpoint, request).await
    }

    /// Exchange credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AccessToken, ClientError> {
        let endpoint = "api/auth/login";
        let request = self
            .http
            .post(self.url(endpoint)?)
            .json(&Credentials { email, password });
        let body: LoginResponse = self.send_json(endpoint, request).await?;

        Ok(AccessToken::new(body.access_token, Some(body.expires_at)))
    }

    /// Revoke an access token.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &AccessToken) -> Result<(), ClientError> {
        let endpoint = "api/auth/logout";
        let request = self
            .http
            .post(self.url(endpoint)?)
            .bearer_auth(token.secret().expose_secret());
        self.send(endpoint, request).await.map(|_| ())
    }

    /// Fetch the account behind a token.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-2xx response.
    #[instrument(skip(self, token))]
    pub async fn me(&self, token: &AccessToken) -> Result<UserProfile, ClientError> {
        let endpoint = "api/auth/me";
        let request = self
            .http
            .get(self.url(endpoint)?)
            .bearer_auth(token.secret().expose_secret());
        self.send_json(endpoint, request).await
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|source| ClientError::Http {
            endpoint: endpoint.to_owned(),
            source,
        })?;

        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "API response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason()),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        self.send(endpoint, request)
            .await?
            .json::<T>()
            .await
            .map_err(|source| ClientError::Deserialization {
                endpoint: endpoint.to_owned(),
                source,
            })
    }
}

/// Extract the server's `{error}` message, falling back to the raw body or
/// the status reason.
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        reason.unwrap_or("request failed").to_string()
    } else {
        trimmed.to_string()
    }
}

impl RequestIdentity {
    /// Attach this identity's headers to a request.
    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Bearer(token) => request.bearer_auth(token.secret().expose_secret()),
            Self::Guest(Some(guest_id)) => {
                request.header(GUEST_SESSION_HEADER, guest_id.to_string())
            }
            Self::Guest(None) => request,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_body() {
        assert_eq!(
            error_message(r#"{"error":"Store not found: acme"}"#, Some("Not Found")),
            "Store not found: acme"
        );
        assert_eq!(error_message("plain text\n", Some("Bad Request")), "plain text");
        assert_eq!(error_message("", Some("Bad Gateway")), "Bad Gateway");
        assert_eq!(error_message("", None), "request failed");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = ClientConfig::new("http://localhost:3000/shop".parse().unwrap());
        let api = ApiClient::new(&config).unwrap();
        assert_eq!(api.base_url().as_str(), "http://localhost:3000/shop/");

        let slug = StoreSlug::parse("acme").unwrap();
        let url = api.url(&ApiClient::cart_path(&slug, "/items/4")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/shop/api/stores/acme/cart/items/4");
    }
}
