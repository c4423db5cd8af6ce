//! Seed stores and products from a YAML file.
//!
//! # File Format
//!
//! ```yaml
//! stores:
//!   - slug: acme-coffee
//!     name: Acme Coffee
//!     currency: USD
//!     products:
//!       - name: House Blend
//!         price: "14.50"
//!       - name: Discontinued Roast
//!         price: "9.00"
//!         active: false
//! ```
//!
//! Seeding is idempotent: stores are matched by slug and products by name
//! within their store, so re-running updates prices in place.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use bazaar_core::{CurrencyCode, StoreSlug};
use bazaar_storefront::db::stores::StoreRepository;

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub stores: Vec<StoreSeed>,
}

#[derive(Debug, Deserialize)]
pub struct StoreSeed {
    pub slug: StoreSlug,
    pub name: String,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Check a seed file for problems the database would reject or silently
/// collapse. Returns one message per problem.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut slugs = HashSet::new();

    for store in &seed.stores {
        if !slugs.insert(&store.slug) {
            errors.push(format!("duplicate store slug {}", store.slug));
        }
        if store.name.trim().is_empty() {
            errors.push(format!("store {} has an empty name", store.slug));
        }

        let mut names = HashSet::new();
        for product in &store.products {
            if product.name.trim().is_empty() {
                errors.push(format!("store {} has a product with an empty name", store.slug));
            }
            if !names.insert(product.name.as_str()) {
                errors.push(format!(
                    "store {} lists product {:?} twice",
                    store.slug, product.name
                ));
            }
            if product.price.is_sign_negative() {
                errors.push(format!(
                    "product {:?} in store {} has a negative price",
                    product.name, store.slug
                ));
            }
        }
    }

    errors
}

/// Seed stores and products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, or if
/// database operations fail.
pub async fn stores(file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %file_path.display(), "Loading seed file");

    // Parse and validate before touching the database
    let content = tokio::fs::read_to_string(file_path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = super::connect_database().await?;
    let repo = StoreRepository::new(&pool);

    let mut products = 0_usize;
    for store_seed in &seed.stores {
        let store = repo
            .upsert(&store_seed.slug, &store_seed.name, store_seed.currency)
            .await?;
        info!(store = %store.slug, id = %store.id, "Store seeded");

        for product in &store_seed.products {
            repo.upsert_product(store.id, &product.name, product.price, product.active)
                .await?;
            products += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Stores: {}", seed.stores.len());
    info!("  Products: {products}");
    Ok(())
}
