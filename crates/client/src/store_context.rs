//! Store context resolver.
//!
//! Tracks which store (tenant) the shopper is browsing, derived from the first
//! segment of the current navigation path. Subscribers are only woken when
//! the resolved store actually changes, so moving between pages of the same
//! store does not reload the cart.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use bazaar_core::StoreSlug;

/// The current store, shared by all clones.
#[derive(Debug, Clone)]
pub struct StoreContext {
    state: Arc<watch::Sender<Option<StoreSlug>>>,
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StoreContext {
    #[must_use]
    pub fn new(initial: Option<StoreSlug>) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
        }
    }

    /// Resolve the store from a navigation path such as `/acme/products/4`.
    ///
    /// Paths under reserved segments (`/auth/...`, `/api/...`) clear the
    /// store. Returns whether the store changed.
    pub fn navigate(&self, path: &str) -> bool {
        self.select(StoreSlug::from_path(path))
    }

    /// Set the store directly. Returns whether the store changed.
    pub fn select(&self, slug: Option<StoreSlug>) -> bool {
        self.state.send_if_modified(|current| {
            if *current == slug {
                return false;
            }
            debug!(from = ?current, to = ?slug, "store context changed");
            *current = slug;
            true
        })
    }

    /// The current store, if any.
    #[must_use]
    pub fn current(&self) -> Option<StoreSlug> {
        self.state.borrow().clone()
    }

    /// Subscribe to store changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<StoreSlug>> {
        self.state.subscribe()
    }
}
