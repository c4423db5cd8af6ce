//! Access token repository.
//!
//! Tokens are never stored in plain text; callers pass the peppered hash
//! produced by [`crate::services::auth::TokenHasher`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::UserId;

use super::RepositoryError;

/// Repository for access token database operations.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    /// Create a new token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a newly issued token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.access_tokens (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Resolve an unexpired token to its user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_user(&self, token_hash: &str) -> Result<Option<UserId>, RepositoryError> {
        let user_id: Option<i32> = sqlx::query_scalar(
            r"
            SELECT user_id
            FROM storefront.access_tokens
            WHERE token_hash = $1 AND expires_at > now()
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(user_id.map(UserId::new))
    }

    /// Revoke a token. Revoking an unknown token is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn revoke(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.access_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every expired token, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.access_tokens WHERE expires_at <= now()")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
