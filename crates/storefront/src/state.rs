//! Application state shared across handlers.

use std::sync::Arc;

use moka::future::Cache;
use sqlx::PgPool;

use bazaar_core::StoreSlug;

use crate::config::StorefrontConfig;
use crate::db::RepositoryError;
use crate::db::stores::StoreRepository;
use crate::models::Store;
use crate::services::auth::TokenHasher;

/// Maximum number of stores kept in the lookup cache.
const STORE_CACHE_CAPACITY: u64 = 1_000;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    token_hasher: TokenHasher,
    stores: Cache<StoreSlug, Store>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let stores = Cache::builder()
            .max_capacity(STORE_CACHE_CAPACITY)
            .time_to_live(config.store_cache_ttl)
            .build();
        let token_hasher = TokenHasher::new(config.token_pepper.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                token_hasher,
                stores,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the access token hasher.
    #[must_use]
    pub fn token_hasher(&self) -> &TokenHasher {
        &self.inner.token_hasher
    }

    /// Look up a store by slug, consulting the cache first.
    ///
    /// Unknown slugs are not cached, so a store created after a miss becomes
    /// visible on the next request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database lookup fails.
    pub async fn store(&self, slug: &StoreSlug) -> Result<Option<Store>, RepositoryError> {
        if let Some(store) = self.inner.stores.get(slug).await {
            return Ok(Some(store));
        }

        let store = StoreRepository::new(&self.inner.pool)
            .get_by_slug(slug)
            .await?;

        if let Some(store) = &store {
            self.inner.stores.insert(slug.clone(), store.clone()).await;
        }

        Ok(store)
    }
}
