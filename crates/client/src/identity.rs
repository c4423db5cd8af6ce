//! Session identity resolver.
//!
//! Decides which credentials a request presents: the bearer token when the
//! user is logged in, otherwise the persisted guest session id (if any).

use bazaar_core::GuestSessionId;

use crate::auth::AccessToken;
use crate::error::StorageError;
use crate::storage::{ClientStorage, GUEST_SESSION_KEY};

/// Credentials attached to an API request.
#[derive(Debug, Clone)]
pub enum RequestIdentity {
    /// Authenticated user.
    Bearer(AccessToken),
    /// Anonymous shopper; `None` asks the server to issue a guest session.
    Guest(Option<GuestSessionId>),
}

impl RequestIdentity {
    /// Resolve the identity for the next request.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if client storage cannot be read.
    pub fn resolve(
        token: Option<AccessToken>,
        storage: &dyn ClientStorage,
    ) -> Result<Self, StorageError> {
        match token {
            Some(token) => Ok(Self::Bearer(token)),
            None => Ok(Self::Guest(stored_guest_id(storage)?)),
        }
    }

    /// Whether this identity is a logged-in user.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Bearer(_))
    }
}

/// Read the persisted guest session id.
///
/// A value that no longer parses is discarded so the server issues a new one.
///
/// # Errors
///
/// Returns `StorageError` if client storage cannot be read or cleaned up.
pub fn stored_guest_id(storage: &dyn ClientStorage) -> Result<Option<GuestSessionId>, StorageError> {
    let Some(raw) = storage.get(GUEST_SESSION_KEY)? else {
        return Ok(None);
    };

    match GuestSessionId::parse(&raw) {
        Ok(id) => Ok(Some(id)),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable guest session id");
            storage.remove(GUEST_SESSION_KEY)?;
            Ok(None)
        }
    }
}
