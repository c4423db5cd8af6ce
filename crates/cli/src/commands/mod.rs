//! Subcommand implementations.

pub mod migrate;
pub mod seed;
pub mod shopper;

use secrecy::SecretString;
use sqlx::PgPool;
use tracing::info;

use bazaar_storefront::db;

/// Connect to the storefront database named by `STOREFRONT_DATABASE_URL`
/// (or `DATABASE_URL`).
async fn connect_database() -> Result<PgPool, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "STOREFRONT_DATABASE_URL not set")?;

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to storefront database");
    Ok(pool)
}
