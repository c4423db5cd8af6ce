//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! bazaar migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in the
//! storefront crate at build time.

use tracing::info;

use bazaar_storefront::db::{self, MIGRATOR};

/// Run all pending storefront migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn storefront() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect_database().await?;

    let known = MIGRATOR.iter().count();
    info!(migrations = known, "Running storefront migrations");
    db::run_migrations(&pool).await?;

    info!("Storefront migrations complete");
    Ok(())
}
