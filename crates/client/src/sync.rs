//! Cart synchronization flow.
//!
//! Keeps the [`CartStore`] consistent with the server across guest and
//! authenticated sessions:
//!
//! - at start, the cart for the current identity is loaded
//! - on login, the stored guest cart is merged into the user's cart and the
//!   guest session id is forgotten
//! - on logout, the cart is cleared and a guest cart is loaded
//! - on login as a different account, the cart is cleared and reloaded
//! - on a store change, the cart is cleared and reloaded for the new store
//!
//! Mutations are sent with the current identity and the snapshot is replaced
//! with the server's response. Nothing is applied optimistically, so a failed
//! request leaves the snapshot untouched.

use std::fmt;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use bazaar_core::{Cart, CartEnvelope, CartItemId, ProductId, StoreSlug};

use crate::api::ApiClient;
use crate::auth::{AccessToken, AuthSession};
use crate::cart_store::CartStore;
use crate::error::ClientError;
use crate::identity::{RequestIdentity, stored_guest_id};
use crate::storage::{ClientStorage, GUEST_SESSION_KEY};
use crate::store_context::StoreContext;

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Add {
        product_id: ProductId,
        quantity: u32,
    },
    Update {
        item_id: CartItemId,
        quantity: u32,
    },
    Remove {
        item_id: CartItemId,
    },
    Clear,
}

/// Reconciles the local cart with the server.
///
/// Cheap to clone. Cart requests are serialized so a reload never races a
/// mutation.
#[derive(Clone)]
pub struct CartSync {
    inner: Arc<CartSyncInner>,
}

struct CartSyncInner {
    api: ApiClient,
    storage: Arc<dyn ClientStorage>,
    auth: AuthSession,
    store: StoreContext,
    cart: CartStore,
    op_lock: Mutex<()>,
}

impl CartSync {
    #[must_use]
    pub fn new(
        api: ApiClient,
        storage: Arc<dyn ClientStorage>,
        auth: AuthSession,
        store: StoreContext,
    ) -> Self {
        Self {
            inner: Arc::new(CartSyncInner {
                api,
                storage,
                auth,
                store,
                cart: CartStore::new(),
                op_lock: Mutex::new(()),
            }),
        }
    }

    /// The cart snapshot this flow maintains.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.inner.auth
    }

    #[must_use]
    pub fn store(&self) -> &StoreContext {
        &self.inner.store
    }

    /// Load the initial cart, then follow auth and store changes in a
    /// background task.
    ///
    /// The task runs until the returned handle is aborted.
    pub async fn start(&self) -> JoinHandle<()> {
        let mut auth_rx = self.inner.auth.subscribe();
        let mut store_rx = self.inner.store.subscribe();
        let mut current_token = token_secret(auth_rx.borrow_and_update().as_ref());
        store_rx.borrow_and_update();

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "initial cart load failed");
        }

        let sync = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = auth_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let now = token_secret(auth_rx.borrow_and_update().as_ref());
                        if now == current_token {
                            continue;
                        }
                        let switched = current_token.is_some() && now.is_some();
                        current_token = now;

                        let result = match (&current_token, switched) {
                            // Another account logged in over the previous one
                            (Some(_), true) => {
                                sync.inner.cart.clear();
                                sync.on_login().await
                            }
                            (Some(_), false) => sync.on_login().await,
                            (None, _) => sync.on_logout().await,
                        };
                        if let Err(e) = result {
                            warn!(error = %e, "cart sync after auth change failed");
                        }
                    }
                    changed = store_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        store_rx.borrow_and_update();
                        sync.inner.cart.clear();

                        if let Err(e) = sync.refresh().await {
                            warn!(error = %e, "cart reload after store change failed");
                        }
                    }
                }
            }
            debug!("cart sync stopped");
        })
    }

    /// Handle a transition to authenticated.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the merge or cart load fails.
    pub async fn on_login(&self) -> Result<(), ClientError> {
        self.refresh().await
    }

    /// Handle a transition to logged out.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the guest cart cannot be loaded.
    pub async fn on_logout(&self) -> Result<(), ClientError> {
        self.inner.cart.clear();
        self.refresh().await
    }

    /// Reload the cart for the current store and identity.
    ///
    /// An authenticated session holding a guest session id merges that guest
    /// cart first. With no store selected the cart is cleared.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails; the snapshot is unchanged.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let _guard = self.inner.op_lock.lock().await;

        let Some(slug) = self.inner.store.current() else {
            self.inner.cart.clear();
            return Ok(());
        };

        let api = &self.inner.api;
        let token = self.inner.auth.token();
        let authenticated = token.is_some();

        let result = match (token, stored_guest_id(self.inner.storage.as_ref())?) {
            (Some(token), Some(guest_id)) => {
                let merged = api.merge_guest_cart(&slug, &token, guest_id).await;
                if merged.is_ok() {
                    self.inner.storage.remove(GUEST_SESSION_KEY)?;
                    info!(store = %slug, "merged guest cart");
                }
                merged
            }
            (Some(token), None) => api.get_cart(&slug, &RequestIdentity::Bearer(token)).await,
            (None, guest) => api.get_cart(&slug, &RequestIdentity::Guest(guest)).await,
        };

        let envelope = self.checked(result, authenticated)?;
        self.apply(&slug, envelope).map(|_| ())
    }

    /// Add a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoStore` with no store selected, or the API error.
    pub async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<Cart, ClientError> {
        self.mutate(Mutation::Add {
            product_id,
            quantity,
        })
        .await
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoStore` with no store selected, or the API error.
    pub async fn update_quantity(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, ClientError> {
        self.mutate(Mutation::Update { item_id, quantity }).await
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoStore` with no store selected, or the API error.
    pub async fn remove_item(&self, item_id: CartItemId) -> Result<Cart, ClientError> {
        self.mutate(Mutation::Remove { item_id }).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoStore` with no store selected, or the API error.
    pub async fn clear(&self) -> Result<Cart, ClientError> {
        self.mutate(Mutation::Clear).await
    }

    #[instrument(skip(self))]
    async fn mutate(&self, mutation: Mutation) -> Result<Cart, ClientError> {
        let _guard = self.inner.op_lock.lock().await;

        let slug = self.inner.store.current().ok_or(ClientError::NoStore)?;
        let identity =
            RequestIdentity::resolve(self.inner.auth.token(), self.inner.storage.as_ref())?;
        let api = &self.inner.api;

        let result = match mutation {
            Mutation::Add {
                product_id,
                quantity,
            } => api.add_item(&slug, &identity, product_id, quantity).await,
            Mutation::Update { item_id, quantity } => {
                api.update_item(&slug, &identity, item_id, quantity).await
            }
            Mutation::Remove { item_id } => api.remove_item(&slug, &identity, item_id).await,
            Mutation::Clear => api.clear_cart(&slug, &identity).await,
        };

        let envelope = self.checked(result, identity.is_authenticated())?;
        self.apply(&slug, envelope)
    }

    /// Log a failed request and end the session if the server rejected our
    /// token.
    fn checked(
        &self,
        result: Result<CartEnvelope, ClientError>,
        authenticated: bool,
    ) -> Result<CartEnvelope, ClientError> {
        result.inspect_err(|e| {
            warn!(error = %e, "cart request failed");
            if authenticated && e.is_unauthorized() {
                self.inner.auth.expire();
            }
        })
    }

    /// Persist the guest id and replace the snapshot, unless the store changed
    /// while the request was in flight. Returns the server's cart either way.
    fn apply(&self, slug: &StoreSlug, envelope: CartEnvelope) -> Result<Cart, ClientError> {
        if let Some(guest_id) = envelope.guest_session_id {
            self.inner
                .storage
                .set(GUEST_SESSION_KEY, &guest_id.to_string())?;
        }

        if self.inner.store.current().as_ref() != Some(slug) {
            debug!(store = %slug, "ignoring cart for a store no longer selected");
            return Ok(envelope.cart);
        }

        self.inner.cart.replace(envelope.cart.clone());
        Ok(envelope.cart)
    }
}

fn token_secret(token: Option<&AccessToken>) -> Option<String> {
    token.map(|t| t.secret().expose_secret().to_owned())
}

impl fmt::Debug for CartSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartSync")
            .field("auth", &self.inner.auth)
            .field("store", &self.inner.store.current())
            .finish_non_exhaustive()
    }
}
