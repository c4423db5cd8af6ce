//! Guest session identifier.
//!
//! Issued by the backend the first time an anonymous shopper touches a cart,
//! persisted client-side, and presented on every later guest request via the
//! [`GUEST_SESSION_HEADER`] header.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// HTTP header carrying the guest session id in both directions.
pub const GUEST_SESSION_HEADER: &str = "x-guest-session-id";

/// Error returned when a guest session id is not a UUID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid guest session id: {0}")]
pub struct GuestSessionIdError(String);

/// Opaque identifier correlating an unauthenticated shopper's carts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestSessionId(Uuid);

impl GuestSessionId {
    /// Generate a fresh random guest session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse a guest session id from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`GuestSessionIdError`] if the value is not a UUID.
    pub fn parse(s: &str) -> Result<Self, GuestSessionIdError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| GuestSessionIdError(s.to_owned()))
    }
}

impl fmt::Display for GuestSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GuestSessionId {
    type Err = GuestSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for GuestSessionId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Uuid as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Uuid as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for GuestSessionId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <Uuid as sqlx::Decode<sqlx::Postgres>>::decode(value).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for GuestSessionId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Uuid as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_display() {
        let id = GuestSessionId::generate();
        let parsed = GuestSessionId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let parsed = GuestSessionId::parse(" 6f1c1c1e-8c47-4c3e-9d0a-1f2e3d4c5b6a ").unwrap();
        assert_eq!(parsed.to_string(), "6f1c1c1e-8c47-4c3e-9d0a-1f2e3d4c5b6a");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(GuestSessionId::parse("guest-123").is_err());
        assert!(GuestSessionId::parse("").is_err());
    }
}
