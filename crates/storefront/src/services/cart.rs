//! Cart service.
//!
//! Resolves the store and cart owner for a request, applies the mutation via
//! [`CartRepository`], and returns the full cart snapshot the client replaces
//! its state with.

use thiserror::Error;
use tracing::instrument;

use bazaar_core::{
    CartEnvelope, CartId, CartItemId, CartOwner, GuestSessionId, ProductId, Quantity, StoreSlug,
    UserId,
};

use crate::db::RepositoryError;
use crate::db::carts::CartRepository;
use crate::db::stores::StoreRepository;
use crate::middleware::Shopper;
use crate::models::Store;
use crate::state::AppState;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No store with this slug.
    #[error("store not found: {0}")]
    StoreNotFound(StoreSlug),

    /// Product unknown, inactive, or sold by another store.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Line item is not in the caller's cart.
    #[error("cart item not found: {0}")]
    ItemNotFound(CartItemId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart operations for a single request.
pub struct CartService<'a> {
    state: &'a AppState,
    carts: CartRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a cart service bound to the shared application state.
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            carts: CartRepository::new(state.pool()),
        }
    }

    /// Get the shopper's cart, creating it (and a guest session) if needed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::StoreNotFound` for an unknown slug.
    #[instrument(skip(self, slug), fields(store = %slug))]
    pub async fn current(
        &self,
        slug: &StoreSlug,
        shopper: Shopper,
    ) -> Result<CartEnvelope, CartError> {
        let store = self.store(slug).await?;
        let owner = self.establish_owner(shopper).await?;
        let cart_id = self.carts.find_or_create(store.id, owner).await?;

        self.envelope(cart_id).await
    }

    /// Add a product to the shopper's cart at its current price.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product is not an active
    /// product of this store.
    #[instrument(skip(self, slug), fields(store = %slug))]
    pub async fn add_item(
        &self,
        slug: &StoreSlug,
        shopper: Shopper,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartEnvelope, CartError> {
        let store = self.store(slug).await?;

        let product = StoreRepository::new(self.state.pool())
            .get_product(store.id, product_id)
            .await?
            .filter(|p| p.active)
            .ok_or(CartError::ProductNotFound(product_id))?;

        let owner = self.establish_owner(shopper).await?;
        let cart_id = self
            .carts
            .add_item(store.id, owner, &product, quantity)
            .await?;

        tracing::info!(%product_id, quantity = quantity.get(), %cart_id, "item added to cart");
        self.envelope(cart_id).await
    }

    /// Set the quantity of a line in the shopper's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in the cart.
    #[instrument(skip(self, slug), fields(store = %slug))]
    pub async fn update_item(
        &self,
        slug: &StoreSlug,
        shopper: Shopper,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<CartEnvelope, CartError> {
        let store = self.store(slug).await?;
        let cart_id = self.existing_cart(&store, shopper, item_id).await?;

        self.carts
            .set_item_quantity(cart_id, item_id, quantity)
            .await
            .map_err(|e| item_error(e, item_id))?;

        self.envelope(cart_id).await
    }

    /// Remove a line from the shopper's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in the cart.
    #[instrument(skip(self, slug), fields(store = %slug))]
    pub async fn remove_item(
        &self,
        slug: &StoreSlug,
        shopper: Shopper,
        item_id: CartItemId,
    ) -> Result<CartEnvelope, CartError> {
        let store = self.store(slug).await?;
        let cart_id = self.existing_cart(&store, shopper, item_id).await?;

        self.carts
            .remove_item(cart_id, item_id)
            .await
            .map_err(|e| item_error(e, item_id))?;

        self.envelope(cart_id).await
    }

    /// Remove every line from the shopper's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::StoreNotFound` for an unknown slug.
    #[instrument(skip(self, slug), fields(store = %slug))]
    pub async fn clear(
        &self,
        slug: &StoreSlug,
        shopper: Shopper,
    ) -> Result<CartEnvelope, CartError> {
        let store = self.store(slug).await?;
        let owner = self.establish_owner(shopper).await?;
        let cart_id = self.carts.find_or_create(store.id, owner).await?;

        self.carts.clear(cart_id).await?;
        self.envelope(cart_id).await
    }

    /// Merge a guest session's carts into the user's carts and return the
    /// user's cart for `slug`.
    ///
    /// An unknown guest session merges nothing, so repeating a merge after a
    /// lost response returns the same user cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::StoreNotFound` for an unknown slug.
    #[instrument(skip(self, slug), fields(store = %slug))]
    pub async fn merge(
        &self,
        slug: &StoreSlug,
        user_id: UserId,
        guest_id: GuestSessionId,
    ) -> Result<CartEnvelope, CartError> {
        let store = self.store(slug).await?;

        let merged = self.carts.merge_guest_into_user(guest_id, user_id).await?;
        tracing::info!(%user_id, merged_carts = merged, "guest carts merged");

        let owner = CartOwner::User(user_id);
        let cart_id = self.carts.find_or_create(store.id, owner).await?;
        self.envelope(cart_id).await
    }

    async fn store(&self, slug: &StoreSlug) -> Result<Store, CartError> {
        self.state
            .store(slug)
            .await?
            .ok_or_else(|| CartError::StoreNotFound(slug.clone()))
    }

    /// Turn a shopper into a cart owner, issuing a guest session when the
    /// guest has none or presented one the server no longer knows.
    async fn establish_owner(&self, shopper: Shopper) -> Result<CartOwner, CartError> {
        match shopper {
            Shopper::User(user_id) => Ok(CartOwner::User(user_id)),
            Shopper::Guest(Some(guest_id)) => {
                if self.carts.touch_guest_session(guest_id).await? {
                    Ok(CartOwner::Guest(guest_id))
                } else {
                    tracing::debug!(%guest_id, "unknown guest session, issuing a new one");
                    self.new_guest().await
                }
            }
            Shopper::Guest(None) => self.new_guest().await,
        }
    }

    /// The shopper's cart in `store`, without issuing a session or creating
    /// a cart. A line cannot be in a cart that does not exist yet, so a
    /// missing cart is reported as the item not being found.
    async fn existing_cart(
        &self,
        store: &Store,
        shopper: Shopper,
        item_id: CartItemId,
    ) -> Result<CartId, CartError> {
        let owner = shopper.owner().ok_or(CartError::ItemNotFound(item_id))?;

        if let CartOwner::Guest(guest_id) = owner {
            if !self.carts.touch_guest_session(guest_id).await? {
                return Err(CartError::ItemNotFound(item_id));
            }
        }

        self.carts
            .find(store.id, owner)
            .await?
            .ok_or(CartError::ItemNotFound(item_id))
    }

    async fn new_guest(&self) -> Result<CartOwner, CartError> {
        let guest_id = self.carts.create_guest_session().await?;
        tracing::info!(%guest_id, "guest session issued");
        Ok(CartOwner::Guest(guest_id))
    }

    async fn envelope(&self, cart_id: CartId) -> Result<CartEnvelope, CartError> {
        let cart = self.carts.load(cart_id).await?;
        Ok(CartEnvelope::from(cart))
    }
}

fn item_error(e: RepositoryError, item_id: CartItemId) -> CartError {
    match e {
        RepositoryError::NotFound => CartError::ItemNotFound(item_id),
        other => CartError::Repository(other),
    }
}
