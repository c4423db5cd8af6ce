//! Cart state store.
//!
//! A single observable slot holding the latest server cart. It is only ever
//! replaced wholesale with a server response or cleared.

use std::sync::Arc;

use tokio::sync::watch;

use bazaar_core::Cart;

/// The client-visible cart snapshot.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    state: Arc<watch::Sender<Option<Cart>>>,
}

impl CartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Option<Cart> {
        self.state.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Cart>> {
        self.state.subscribe()
    }

    pub(crate) fn replace(&self, cart: Cart) {
        self.state.send_replace(Some(cart));
    }

    pub(crate) fn clear(&self) {
        self.state.send_if_modified(|current| current.take().is_some());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use bazaar_core::{CartId, CartOwner, CurrencyCode, GuestSessionId, StoreId};

    use super::*;

    fn cart(id: i32) -> Cart {
        Cart::assemble(
            CartId::new(id),
            StoreId::new(1),
            CartOwner::Guest(GuestSessionId::generate()),
            CurrencyCode::USD,
            Vec::new(),
            Decimal::ZERO,
            Utc::now(),
        )
    }

    #[test]
    fn test_replace_and_clear() {
        let store = CartStore::new();
        let mut rx = store.subscribe();
        assert!(store.snapshot().is_none());

        store.replace(cart(7));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().id, CartId::new(7));

        store.clear();
        assert!(store.snapshot().is_none());
        rx.borrow_and_update();

        // Clearing an empty store does not notify
        store.clear();
        assert!(!rx.has_changed().unwrap());
    }
}
