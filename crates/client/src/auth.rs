//! Authentication session.
//!
//! Holds the bearer token for the logged-in user and publishes every change
//! on a `watch` channel. The token is persisted in [`ClientStorage`] under
//! [`ACCESS_TOKEN_KEY`] so a restarted client resumes the same session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, UserProfile};
use crate::error::{ClientError, StorageError};
use crate::storage::{ACCESS_TOKEN_KEY, ClientStorage};

/// Bearer token issued by `POST /api/auth/login`.
#[derive(Clone)]
pub struct AccessToken {
    secret: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    #[must_use]
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: SecretString::from(token),
            expires_at,
        }
    }

    /// The raw token value.
    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Server-reported expiry, if known.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the token is known to have expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// On-disk form of a token.
#[derive(Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

fn load_token(storage: &dyn ClientStorage) -> Result<Option<AccessToken>, StorageError> {
    let Some(raw) = storage.get(ACCESS_TOKEN_KEY)? else {
        return Ok(None);
    };

    let token = match serde_json::from_str::<StoredToken>(&raw) {
        Ok(stored) => AccessToken::new(stored.access_token, stored.expires_at),
        // A bare string is accepted as a token without a known expiry
        Err(_) if !raw.trim().is_empty() => AccessToken::new(raw.trim().to_owned(), None),
        Err(_) => {
            storage.remove(ACCESS_TOKEN_KEY)?;
            return Ok(None);
        }
    };

    if token.is_expired_at(Utc::now()) {
        info!("discarding expired access token");
        storage.remove(ACCESS_TOKEN_KEY)?;
        return Ok(None);
    }

    Ok(Some(token))
}

fn store_token(storage: &dyn ClientStorage, token: &AccessToken) -> Result<(), StorageError> {
    let stored = StoredToken {
        access_token: token.secret().expose_secret().to_owned(),
        expires_at: token.expires_at(),
    };
    storage.set(ACCESS_TOKEN_KEY, &serde_json::to_string(&stored)?)
}

/// The client's login state.
///
/// Cheap to clone; all clones share one token and one state channel.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthSessionInner>,
}

struct AuthSessionInner {
    api: ApiClient,
    storage: Arc<dyn ClientStorage>,
    state: watch::Sender<Option<AccessToken>>,
}

impl AuthSession {
    /// Create a session, resuming a persisted token if one is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if client storage cannot be read.
    pub fn new(api: ApiClient, storage: Arc<dyn ClientStorage>) -> Result<Self, StorageError> {
        let token = load_token(storage.as_ref())?;
        let (state, _) = watch::channel(token);

        Ok(Self {
            inner: Arc::new(AuthSessionInner {
                api,
                storage,
                state,
            }),
        })
    }

    /// Subscribe to token changes. `Some` means authenticated.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AccessToken>> {
        self.inner.state.subscribe()
    }

    /// The current token, if logged in.
    #[must_use]
    pub fn token(&self) -> Option<AccessToken> {
        self.inner.state.borrow().clone()
    }

    /// Whether a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_some()
    }

    /// Log in and publish the authenticated state.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the credentials are rejected or the token
    /// cannot be persisted.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let token = self.inner.api.login(email, password).await?;
        store_token(self.inner.storage.as_ref(), &token)?;
        self.inner.state.send_replace(Some(token));

        info!("logged in");
        Ok(())
    }

    /// Log out and publish the unauthenticated state.
    ///
    /// Revoking the token server-side is best effort; the local session is
    /// always cleared.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Storage` if the stored token cannot be removed.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ClientError> {
        let Some(token) = self.token() else {
            return Ok(());
        };

        if let Err(e) = self.inner.api.logout(&token).await {
            warn!(error = %e, "server-side logout failed");
        }

        self.clear()?;
        info!("logged out");
        Ok(())
    }

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the server rejects the registration.
    pub async fn register(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        self.inner.api.register(email, password).await
    }

    /// Fetch the logged-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotAuthenticated` when logged out, or the API
    /// error otherwise. A rejected token ends the local session.
    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        let token = self.token().ok_or(ClientError::NotAuthenticated)?;

        match self.inner.api.me(&token).await {
            Err(e) if e.is_unauthorized() => {
                self.expire();
                Err(e)
            }
            other => other,
        }
    }

    /// Drop a token the server no longer accepts.
    pub(crate) fn expire(&self) {
        warn!("access token rejected, ending session");
        if let Err(e) = self.clear() {
            warn!(error = %e, "failed to remove stored access token");
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        let removed = self.inner.storage.remove(ACCESS_TOKEN_KEY);
        self.inner.state.send_replace(None);
        removed
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
