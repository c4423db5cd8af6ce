//! Bazaar client - session and cart reconciliation for shoppers.
//!
//! Keeps one client-visible cart consistent with the storefront API while
//! the shopper moves between stores, logs in and logs out.
//!
//! # Modules
//!
//! - [`api`] - Typed wrappers over the `/api` REST endpoints
//! - [`auth`] - Access token and login state
//! - [`identity`] - Which credentials the next request presents
//! - [`storage`] - Persistent key/value storage (memory or JSON file)
//! - [`store_context`] - Current store resolved from the navigation path
//! - [`cart_store`] - Observable cart snapshot
//! - [`sync`] - Reconciliation between the snapshot and the server
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env()?;
//! let sync = bazaar_client::connect(&config)?;
//! let task = sync.start().await;
//!
//! sync.store().navigate("/acme-coffee/products/12");
//! sync.add_item(ProductId::new(12), 1).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart_store;
pub mod config;
pub mod error;
pub mod identity;
pub mod storage;
pub mod store_context;
pub mod sync;

use std::sync::Arc;

pub use api::{ApiClient, StoreSummary, UserProfile};
pub use auth::{AccessToken, AuthSession};
pub use cart_store::CartStore;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, StorageError};
pub use identity::RequestIdentity;
pub use storage::{ClientStorage, FileStorage, MemoryStorage};
pub use store_context::StoreContext;
pub use sync::CartSync;

/// Build a cart sync over file-backed storage at `config.storage_path`.
///
/// No store is selected yet and nothing is loaded until
/// [`CartSync::start`] or [`CartSync::refresh`] runs.
///
/// # Errors
///
/// Returns `ClientError` if the HTTP client cannot be built or the storage
/// file cannot be read.
pub fn connect(config: &ClientConfig) -> Result<CartSync, ClientError> {
    let api = ApiClient::new(config)?;
    let storage: Arc<dyn ClientStorage> = Arc::new(FileStorage::open(&config.storage_path)?);
    let auth = AuthSession::new(api.clone(), Arc::clone(&storage))?;

    Ok(CartSync::new(api, storage, auth, StoreContext::default()))
}
