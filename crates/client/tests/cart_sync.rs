//! Cart synchronization against a mocked storefront API.
//!
//! Each test mounts the endpoints it expects the client to call on a
//! wiremock server and drives a `CartSync` over in-memory storage.
//!
//! ## Flows Tested
//!
//! | Flow | Test |
//! |------|------|
//! | Startup as guest | `startup_*` |
//! | Login merge, account switch | `login_*` |
//! | Logout reload | `logout_*` |
//! | Mutations | `add_item_*`, `update_*`, `failed_*`, `mutation_*` |
//! | Store change | `store_change_*` |
//! | Rejected token | `unauthorized_*` |

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use bazaar_client::storage::{ACCESS_TOKEN_KEY, GUEST_SESSION_KEY};
use bazaar_client::{
    ApiClient, AuthSession, CartSync, ClientConfig, ClientError, ClientStorage, MemoryStorage,
    StoreContext,
};
use bazaar_core::{
    Cart, CartEnvelope, CartId, CartItem, CartItemId, CartOwner, CurrencyCode, GuestSessionId,
    ProductId, Quantity, StoreId, StoreSlug, UserId,
};

// =============================================================================
// Fixtures
// =============================================================================

fn slug(s: &str) -> StoreSlug {
    StoreSlug::parse(s).unwrap()
}

fn cart(id: i32, store_id: i32, owner: CartOwner, lines: &[(i32, i32, i64)]) -> Cart {
    let items = lines
        .iter()
        .map(|&(item_id, product_id, quantity)| {
            CartItem::new(
                CartItemId::new(item_id),
                ProductId::new(product_id),
                format!("Product {product_id}"),
                Quantity::new(quantity).unwrap(),
                Decimal::new(1250, 2),
            )
        })
        .collect();

    Cart::assemble(
        CartId::new(id),
        StoreId::new(store_id),
        owner,
        CurrencyCode::USD,
        items,
        Decimal::ZERO,
        Utc::now(),
    )
}

fn respond_with_cart(cart: Cart) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(CartEnvelope::from(cart))
}

fn without_auth(request: &Request) -> bool {
    !request.headers.contains_key("authorization")
}

fn without_guest_header(request: &Request) -> bool {
    !request.headers.contains_key("x-guest-session-id")
}

/// Build a `CartSync` on `store` against the mock server.
fn cart_sync(server: &MockServer, storage: &Arc<MemoryStorage>, store: Option<&str>) -> CartSync {
    let config = ClientConfig::new(server.uri().parse().unwrap());
    let api = ApiClient::new(&config).unwrap();
    let storage: Arc<dyn ClientStorage> = storage.clone();
    let auth = AuthSession::new(api.clone(), Arc::clone(&storage)).unwrap();

    CartSync::new(api, storage, auth, StoreContext::new(store.map(slug)))
}

async fn wait_for_cart(sync: &CartSync, mut done: impl FnMut(&Cart) -> bool) -> Cart {
    let mut rx = sync.cart().subscribe();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|cart| cart.as_ref().is_some_and(&mut done)),
    )
    .await
    .expect("timed out waiting for cart")
    .unwrap();

    (*snapshot).clone().unwrap()
}

fn stored_guest(storage: &MemoryStorage) -> Option<String> {
    storage.get(GUEST_SESSION_KEY).unwrap()
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test]
async fn startup_loads_guest_cart_and_persists_guest_id() {
    let server = MockServer::start().await;
    let guest = GuestSessionId::generate();

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(without_auth)
        .and(without_guest_header)
        .respond_with(respond_with_cart(cart(1, 1, CartOwner::Guest(guest), &[])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let sync = cart_sync(&server, &storage, Some("acme"));
    let task = sync.start().await;

    let snapshot = sync.cart().snapshot().unwrap();
    assert_eq!(snapshot.id, CartId::new(1));
    assert_eq!(stored_guest(&storage), Some(guest.to_string()));

    task.abort();
}

#[tokio::test]
async fn startup_presents_stored_guest_id() {
    let server = MockServer::start().await;
    let guest = GuestSessionId::generate();

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(header("x-guest-session-id", guest.to_string().as_str()))
        .respond_with(respond_with_cart(cart(
            4,
            1,
            CartOwner::Guest(guest),
            &[(10, 5, 2)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(GUEST_SESSION_KEY, &guest.to_string()).unwrap();

    let sync = cart_sync(&server, &storage, Some("acme"));
    sync.refresh().await.unwrap();

    let snapshot = sync.cart().snapshot().unwrap();
    assert_eq!(snapshot.item_count(), 2);
    assert_eq!(snapshot.subtotal, Decimal::new(2500, 2));
}

#[tokio::test]
async fn startup_without_store_keeps_cart_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let sync = cart_sync(&server, &storage, None);
    sync.refresh().await.unwrap();

    assert!(sync.cart().snapshot().is_none());
}

// =============================================================================
// Login / logout
// =============================================================================

#[tokio::test]
async fn login_merges_guest_cart_and_forgets_guest_id() {
    let server = MockServer::start().await;
    let guest = GuestSessionId::generate();
    let user = UserId::new(42);

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(header("x-guest-session-id", guest.to_string().as_str()))
        .respond_with(respond_with_cart(cart(
            1,
            1,
            CartOwner::Guest(guest),
            &[(1, 7, 1)],
        )))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "ann@example.com", "password": "hunter22!"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "token_type": "Bearer",
            "expires_at": (Utc::now() + chrono::Duration::days(1)).to_rfc3339(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/stores/acme/cart/merge"))
        .and(header("authorization", "Bearer tok-123"))
        .and(body_json(json!({"guest_session_id": guest.to_string()})))
        .respond_with(respond_with_cart(cart(
            9,
            1,
            CartOwner::User(user),
            &[(20, 7, 3)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(GUEST_SESSION_KEY, &guest.to_string()).unwrap();

    let sync = cart_sync(&server, &storage, Some("acme"));
    let task = sync.start().await;
    assert_eq!(sync.cart().snapshot().unwrap().id, CartId::new(1));

    sync.auth().login("ann@example.com", "hunter22!").await.unwrap();

    let merged = wait_for_cart(&sync, |c| c.owner == CartOwner::User(user)).await;
    assert_eq!(merged.id, CartId::new(9));
    assert_eq!(merged.item_count(), 3);
    assert_eq!(stored_guest(&storage), None);
    assert!(storage.get(ACCESS_TOKEN_KEY).unwrap().is_some());

    task.abort();
}

#[tokio::test]
async fn login_without_guest_id_loads_user_cart() {
    let server = MockServer::start().await;
    let user = UserId::new(3);

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(respond_with_cart(cart(5, 1, CartOwner::User(user), &[])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/stores/acme/cart/merge"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "tok").unwrap();

    let sync = cart_sync(&server, &storage, Some("acme"));
    sync.on_login().await.unwrap();

    assert_eq!(sync.cart().snapshot().unwrap().owner, CartOwner::User(user));
}

#[tokio::test]
async fn logout_clears_and_loads_guest_cart() {
    let server = MockServer::start().await;
    let user = UserId::new(8);
    let fresh_guest = GuestSessionId::generate();

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(respond_with_cart(cart(
            2,
            1,
            CartOwner::User(user),
            &[(3, 1, 4)],
        )))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(without_auth)
        .respond_with(respond_with_cart(cart(
            6,
            1,
            CartOwner::Guest(fresh_guest),
            &[],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "tok").unwrap();

    let sync = cart_sync(&server, &storage, Some("acme"));
    let task = sync.start().await;
    assert_eq!(sync.cart().snapshot().unwrap().owner, CartOwner::User(user));

    sync.auth().logout().await.unwrap();
    assert!(!sync.auth().is_authenticated());

    let guest_cart = wait_for_cart(&sync, |c| c.owner == CartOwner::Guest(fresh_guest)).await;
    assert!(guest_cart.is_empty());
    assert_eq!(stored_guest(&storage), Some(fresh_guest.to_string()));
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);

    task.abort();
}

#[tokio::test]
async fn logout_survives_server_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "tok").unwrap();

    let sync = cart_sync(&server, &storage, None);
    sync.auth().logout().await.unwrap();

    assert!(!sync.auth().is_authenticated());
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn login_as_another_account_reloads_cart() {
    let server = MockServer::start().await;
    let first = UserId::new(1);
    let second = UserId::new(2);

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(header("authorization", "Bearer tok-a"))
        .respond_with(respond_with_cart(cart(
            11,
            1,
            CartOwner::User(first),
            &[(1, 7, 2)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-b",
            "token_type": "Bearer",
            "expires_at": (Utc::now() + chrono::Duration::days(1)).to_rfc3339(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(header("authorization", "Bearer tok-b"))
        .respond_with(respond_with_cart(cart(12, 1, CartOwner::User(second), &[])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "tok-a").unwrap();

    let sync = cart_sync(&server, &storage, Some("acme"));
    let task = sync.start().await;
    assert_eq!(sync.cart().snapshot().unwrap().owner, CartOwner::User(first));

    sync.auth().login("bob@example.com", "hunter22!").await.unwrap();

    let reloaded = wait_for_cart(&sync, |c| c.owner == CartOwner::User(second)).await;
    assert_eq!(reloaded.id, CartId::new(12));
    assert!(reloaded.is_empty());

    task.abort();
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn add_item_sends_bearer_and_replaces_snapshot() {
    let server = MockServer::start().await;
    let user = UserId::new(1);

    Mock::given(method("POST"))
        .and(path("/api/stores/acme/cart/items"))
        .and(header("authorization", "Bearer tok"))
        .and(without_guest_header)
        .and(body_json(json!({"product_id": 5, "quantity": 2})))
        .respond_with(respond_with_cart(cart(
            3,
            1,
            CartOwner::User(user),
            &[(11, 5, 2)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "tok").unwrap();
    // Ignored while logged in
    storage
        .set(GUEST_SESSION_KEY, &GuestSessionId::generate().to_string())
        .unwrap();

    let sync = cart_sync(&server, &storage, Some("acme"));
    let returned = sync.add_item(ProductId::new(5), 2).await.unwrap();

    assert_eq!(returned.line_for(ProductId::new(5)).unwrap().quantity.get(), 2);
    assert_eq!(sync.cart().snapshot().unwrap(), returned);
}

#[tokio::test]
async fn update_quantity_sends_guest_header() {
    let server = MockServer::start().await;
    let guest = GuestSessionId::generate();

    Mock::given(method("PATCH"))
        .and(path("/api/stores/acme/cart/items/11"))
        .and(header("x-guest-session-id", guest.to_string().as_str()))
        .and(without_auth)
        .and(body_json(json!({"quantity": 3})))
        .respond_with(respond_with_cart(cart(
            3,
            1,
            CartOwner::Guest(guest),
            &[(11, 5, 3)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(GUEST_SESSION_KEY, &guest.to_string()).unwrap();

    let sync = cart_sync(&server, &storage, Some("acme"));
    let returned = sync.update_quantity(CartItemId::new(11), 3).await.unwrap();

    assert_eq!(returned.item_count(), 3);
}

#[tokio::test]
async fn remove_and_clear_replace_snapshot() {
    let server = MockServer::start().await;
    let guest = GuestSessionId::generate();

    Mock::given(method("DELETE"))
        .and(path("/api/stores/acme/cart/items/11"))
        .respond_with(respond_with_cart(cart(
            3,
            1,
            CartOwner::Guest(guest),
            &[(12, 6, 1)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/stores/acme/cart"))
        .respond_with(respond_with_cart(cart(3, 1, CartOwner::Guest(guest), &[])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let sync = cart_sync(&server, &storage, Some("acme"));

    sync.remove_item(CartItemId::new(11)).await.unwrap();
    assert_eq!(sync.cart().snapshot().unwrap().items.len(), 1);

    sync.clear().await.unwrap();
    assert!(sync.cart().snapshot().unwrap().is_empty());
    assert_eq!(stored_guest(&storage), Some(guest.to_string()));
}

#[tokio::test]
async fn failed_mutation_leaves_snapshot_unchanged() {
    let server = MockServer::start().await;
    let guest = GuestSessionId::generate();

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .respond_with(respond_with_cart(cart(
            1,
            1,
            CartOwner::Guest(guest),
            &[(1, 2, 1)],
        )))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/stores/acme/cart/items"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "Product not found: 99"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let sync = cart_sync(&server, &storage, Some("acme"));
    sync.refresh().await.unwrap();
    let before = sync.cart().snapshot().unwrap();

    let err = sync.add_item(ProductId::new(99), 1).await.unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Product not found: 99");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }

    assert_eq!(sync.cart().snapshot().unwrap(), before);
}

#[tokio::test]
async fn mutation_without_store_is_rejected() {
    let server = MockServer::start().await;
    let storage = Arc::new(MemoryStorage::new());
    let sync = cart_sync(&server, &storage, None);

    let err = sync.add_item(ProductId::new(1), 1).await.unwrap_err();
    assert!(matches!(err, ClientError::NoStore));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// =============================================================================
// Store context
// =============================================================================

#[tokio::test]
async fn store_change_reloads_cart() {
    let server = MockServer::start().await;
    let guest = GuestSessionId::generate();

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .respond_with(respond_with_cart(cart(1, 1, CartOwner::Guest(guest), &[])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/stores/tea-house/cart"))
        .and(header("x-guest-session-id", guest.to_string().as_str()))
        .respond_with(respond_with_cart(cart(2, 2, CartOwner::Guest(guest), &[])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let sync = cart_sync(&server, &storage, None);
    sync.store().navigate("/acme/products/3");
    let task = sync.start().await;
    assert_eq!(sync.cart().snapshot().unwrap().store_id, StoreId::new(1));

    // Same store, different page: no reload
    assert!(!sync.store().navigate("/acme/cart"));

    assert!(sync.store().navigate("/tea-house"));
    let reloaded = wait_for_cart(&sync, |c| c.store_id == StoreId::new(2)).await;
    assert_eq!(reloaded.id, CartId::new(2));

    task.abort();
}

// =============================================================================
// Rejected token
// =============================================================================

#[tokio::test]
async fn unauthorized_refresh_ends_session_and_falls_back_to_guest() {
    let server = MockServer::start().await;
    let guest = GuestSessionId::generate();

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "invalid or expired token"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/stores/acme/cart"))
        .and(without_auth)
        .respond_with(respond_with_cart(cart(7, 1, CartOwner::Guest(guest), &[])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, "stale").unwrap();

    let sync = cart_sync(&server, &storage, Some("acme"));
    assert!(sync.auth().is_authenticated());
    let task = sync.start().await;

    let guest_cart = wait_for_cart(&sync, |c| c.owner == CartOwner::Guest(guest)).await;
    assert_eq!(guest_cart.id, CartId::new(7));
    assert!(!sync.auth().is_authenticated());
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);

    task.abort();
}
