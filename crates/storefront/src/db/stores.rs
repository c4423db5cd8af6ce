//! Store and product repository.
//!
//! Stores are looked up by slug on every cart request; the lookup result is
//! cached in [`crate::state::AppState`]. Products are read to snapshot their
//! price onto cart lines.

use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{CurrencyCode, ProductId, StoreId, StoreSlug};

use super::RepositoryError;
use crate::models::{Product, Store};

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: i32,
    slug: String,
    name: String,
    currency: String,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let slug = StoreSlug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid slug for store {}: {e}", row.id))
        })?;
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("store {}: {e}", row.id))
        })?;

        Ok(Self {
            id: StoreId::new(row.id),
            slug,
            name: row.name,
            currency,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    store_id: i32,
    name: String,
    price: Decimal,
    active: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            price: row.price,
            active: row.active,
        }
    }
}

/// Repository for store and product database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a store by its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_slug(&self, slug: &StoreSlug) -> Result<Option<Store>, RepositoryError> {
        sqlx::query_as::<_, StoreRow>(
            r"
            SELECT id, slug, name, currency
            FROM storefront.stores
            WHERE slug = $1
            ",
        )
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?
        .map(Store::try_from)
        .transpose()
    }

    /// Create a store or update the name/currency of an existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        slug: &StoreSlug,
        name: &str,
        currency: CurrencyCode,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            INSERT INTO storefront.stores (slug, name, currency)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE
                SET name = EXCLUDED.name, currency = EXCLUDED.currency
            RETURNING id, slug, name, currency
            ",
        )
        .bind(slug.as_str())
        .bind(name)
        .bind(currency.code())
        .fetch_one(self.pool)
        .await?;

        Store::try_from(row)
    }

    /// Get a product belonging to a store.
    ///
    /// Returns `None` if the product does not exist or belongs to another store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, store_id, name, price, active
            FROM storefront.products
            WHERE id = $1 AND store_id = $2
            ",
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Create a product or update the price/active flag of an existing one
    /// with the same name in the same store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_product(
        &self,
        store_id: StoreId,
        name: &str,
        price: Decimal,
        active: bool,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO storefront.products (store_id, name, price, active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (store_id, name) DO UPDATE
                SET price = EXCLUDED.price, active = EXCLUDED.active, updated_at = now()
            RETURNING id, store_id, name, price, active
            ",
        )
        .bind(store_id)
        .bind(name)
        .bind(price)
        .bind(active)
        .fetch_one(self.pool)
        .await?;

        Ok(Product::from(row))
    }
}
