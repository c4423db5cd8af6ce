//! Shopper commands driving the storefront API through `bazaar-client`.
//!
//! Session state (guest session id and access token) persists in the JSON
//! file at `BAZAAR_STORAGE_PATH`, so consecutive invocations behave like one
//! browser tab: a guest cart built before `login` is merged on the next cart
//! command after it.
//!
//! # Environment Variables
//!
//! - `BAZAAR_API_URL` - Storefront API base URL
//! - `BAZAAR_STORAGE_PATH` - Session file location
//! - `BAZAAR_HTTP_TIMEOUT_SECS` - Per-request timeout

use std::fmt::Write as _;

use tracing::info;

use bazaar_client::{CartSync, ClientConfig};
use bazaar_core::{Cart, CartItemId, Price, ProductId, StoreSlug};

/// A cart operation for one store.
#[derive(Debug, Clone, Copy)]
pub enum CartCommand {
    Show,
    Add { product_id: i32, quantity: u32 },
    Update { item_id: i32, quantity: u32 },
    Remove { item_id: i32 },
    Clear,
}

fn connect() -> Result<CartSync, Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env()?;
    Ok(bazaar_client::connect(&config)?)
}

#[allow(clippy::print_stdout)]
fn emit(text: &str) {
    println!("{text}");
}

/// Create an account.
///
/// # Errors
///
/// Returns an error if the server rejects the registration.
pub async fn register(email: &str, password: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sync = connect()?;
    let profile = sync.auth().register(email, password).await?;

    emit(&format!("Registered {} (user {})", profile.email, profile.id));
    Ok(())
}

/// Log in, merging the guest cart for `store` right away if one is given.
///
/// # Errors
///
/// Returns an error if the credentials are rejected or the merge fails.
pub async fn login(
    email: &str,
    password: &str,
    store: Option<StoreSlug>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sync = connect()?;
    sync.auth().login(email, password).await?;
    emit(&format!("Logged in as {email}"));

    if let Some(slug) = store {
        sync.store().select(Some(slug.clone()));
        sync.on_login().await?;
        if let Some(cart) = sync.cart().snapshot() {
            emit(&render_cart(&slug, &cart));
        }
    }

    Ok(())
}

/// Log out and forget the stored token.
///
/// # Errors
///
/// Returns an error if the session file cannot be updated.
pub async fn logout() -> Result<(), Box<dyn std::error::Error>> {
    let sync = connect()?;
    if !sync.auth().is_authenticated() {
        emit("Not logged in");
        return Ok(());
    }

    sync.auth().logout().await?;
    emit("Logged out");
    Ok(())
}

/// Show the logged-in account.
///
/// # Errors
///
/// Returns an error if not logged in or the token is rejected.
pub async fn whoami() -> Result<(), Box<dyn std::error::Error>> {
    let sync = connect()?;
    let profile = sync.auth().me().await?;

    emit(&format!(
        "{} (user {}, since {})",
        profile.email,
        profile.id,
        profile.created_at.format("%Y-%m-%d")
    ));
    Ok(())
}

/// Run a cart operation against `store`.
///
/// The cart is reconciled first, which merges a pending guest cart for a
/// user who logged in without naming a store.
///
/// # Errors
///
/// Returns an error if any API call fails.
pub async fn cart(store: StoreSlug, command: CartCommand) -> Result<(), Box<dyn std::error::Error>> {
    let sync = connect()?;
    sync.store().select(Some(store.clone()));
    sync.refresh().await?;

    let cart = match command {
        CartCommand::Show => sync.cart().snapshot(),
        CartCommand::Add {
            product_id,
            quantity,
        } => Some(sync.add_item(ProductId::new(product_id), quantity).await?),
        CartCommand::Update { item_id, quantity } => Some(
            sync.update_quantity(CartItemId::new(item_id), quantity)
                .await?,
        ),
        CartCommand::Remove { item_id } => {
            Some(sync.remove_item(CartItemId::new(item_id)).await?)
        }
        CartCommand::Clear => Some(sync.clear().await?),
    };

    if let Some(cart) = cart {
        info!(cart_id = %cart.id, items = cart.items.len(), "cart updated");
        emit(&render_cart(&store, &cart));
    }
    Ok(())
}

/// Render a cart as a plain-text table.
#[must_use]
pub fn render_cart(store: &StoreSlug, cart: &Cart) -> String {
    let mut out = format!("{store} cart #{} ({} items)\n", cart.id, cart.item_count());

    if cart.is_empty() {
        out.push_str("  (empty)\n");
    }

    for item in &cart.items {
        let _ = writeln!(
            out,
            "  [{}] {} x{} @ {} = {}",
            item.id,
            item.product_name,
            item.quantity.get(),
            Price::new(item.unit_price, cart.currency),
            Price::new(item.line_total, cart.currency),
        );
    }

    let _ = writeln!(out, "Subtotal: {}", cart.subtotal_price());
    if !cart.discount_amount.is_zero() {
        let _ = writeln!(
            out,
            "Discount: -{}",
            Price::new(cart.discount_amount, cart.currency)
        );
    }
    let _ = write!(out, "Total:    {}", cart.grand_total_price());

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use bazaar_core::{CartId, CartItem, CartOwner, CurrencyCode, GuestSessionId, Quantity, StoreId};

    use super::*;

    #[test]
    fn test_render_cart() {
        let cart = Cart::assemble(
            CartId::new(12),
            StoreId::new(1),
            CartOwner::Guest(GuestSessionId::generate()),
            CurrencyCode::USD,
            vec![CartItem::new(
                CartItemId::new(3),
                ProductId::new(7),
                "House Blend".to_string(),
                Quantity::new(2).unwrap(),
                Decimal::new(1450, 2),
            )],
            Decimal::new(500, 2),
            Utc::now(),
        );

        let text = render_cart(&StoreSlug::parse("acme").unwrap(), &cart);
        assert!(text.starts_with("acme cart #12 (2 items)"));
        assert!(text.contains("[3] House Blend x2 @ $14.50 = $29.00"));
        assert!(text.contains("Discount: -$5.00"));
        assert!(text.ends_with("Total:    $24.00"));
    }

    #[test]
    fn test_render_empty_cart() {
        let cart = Cart::assemble(
            CartId::new(1),
            StoreId::new(1),
            CartOwner::Guest(GuestSessionId::generate()),
            CurrencyCode::GBP,
            Vec::new(),
            Decimal::ZERO,
            Utc::now(),
        );

        let text = render_cart(&StoreSlug::parse("tea-house").unwrap(), &cart);
        assert!(text.contains("(empty)"));
        assert!(!text.contains("Discount"));
        assert!(text.ends_with("£0.00"));
    }
}
