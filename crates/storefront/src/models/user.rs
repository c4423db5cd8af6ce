//! User domain types.

use chrono::{DateTime, Utc};

use bazaar_core::{Email, UserId};

/// A registered shopper.
///
/// Accounts are platform-wide; carts are per store.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized email address (login identifier).
    pub email: Email,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}
