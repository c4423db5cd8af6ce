//! Cart and guest session repository.
//!
//! Every cart belongs to exactly one owner (user or guest session) within a
//! store; the `carts_single_owner` check constraint and the two
//! `UNIQUE (store_id, ...)` constraints enforce this at the database level.
//! Mutations bump `carts.updated_at` so clients can tell snapshots apart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use bazaar_core::{
    Cart, CartId, CartItem, CartItemId, CartOwner, CurrencyCode, GuestSessionId, ProductId,
    Quantity, StoreId, UserId,
};

use super::RepositoryError;
use crate::models::Product;

#[derive(sqlx::FromRow)]
struct CartRow {
    id: i32,
    store_id: i32,
    user_id: Option<i32>,
    guest_session_id: Option<Uuid>,
    discount_amount: Decimal,
    updated_at: DateTime<Utc>,
    currency: String,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    product_id: i32,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::new(i64::from(row.quantity)).map_err(|e| {
            RepositoryError::DataCorruption(format!("cart item {}: {e}", row.id))
        })?;

        Ok(Self::new(
            CartItemId::new(row.id),
            ProductId::new(row.product_id),
            row.product_name,
            quantity,
            row.unit_price,
        ))
    }
}

fn owner_from_columns(
    cart_id: i32,
    user_id: Option<i32>,
    guest_session_id: Option<Uuid>,
) -> Result<CartOwner, RepositoryError> {
    match (user_id, guest_session_id) {
        (Some(user), None) => Ok(CartOwner::User(UserId::new(user))),
        (None, Some(guest)) => Ok(CartOwner::Guest(GuestSessionId::from_uuid(guest))),
        _ => Err(RepositoryError::DataCorruption(format!(
            "cart {cart_id} must have exactly one owner"
        ))),
    }
}

/// Find the owner's cart in a store, creating an empty one if needed.
async fn find_or_create_in(
    conn: &mut PgConnection,
    store_id: StoreId,
    owner: CartOwner,
) -> Result<CartId, RepositoryError> {
    // The no-op update makes RETURNING yield the existing row on conflict.
    let id: i32 = match owner {
        CartOwner::User(user_id) => {
            sqlx::query_scalar(
                r"
                INSERT INTO storefront.carts (store_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (store_id, user_id) DO UPDATE SET store_id = EXCLUDED.store_id
                RETURNING id
                ",
            )
            .bind(store_id)
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?
        }
        CartOwner::Guest(guest_id) => {
            sqlx::query_scalar(
                r"
                INSERT INTO storefront.carts (store_id, guest_session_id)
                VALUES ($1, $2)
                ON CONFLICT (store_id, guest_session_id) DO UPDATE SET store_id = EXCLUDED.store_id
                RETURNING id
                ",
            )
            .bind(store_id)
            .bind(guest_id)
            .fetch_one(&mut *conn)
            .await?
        }
    };

    Ok(CartId::new(id))
}

/// Cap applied when quantities are summed in SQL.
fn max_quantity() -> i32 {
    i32::try_from(Quantity::MAX).unwrap_or(i32::MAX)
}

async fn touch_cart(conn: &mut PgConnection, cart_id: CartId) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE storefront.carts SET updated_at = now() WHERE id = $1")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Guest Sessions
    // =========================================================================

    /// Issue a new guest session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_guest_session(&self) -> Result<GuestSessionId, RepositoryError> {
        let id = GuestSessionId::generate();
        sqlx::query("INSERT INTO storefront.guest_sessions (id) VALUES ($1)")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(id)
    }

    /// Mark a guest session as seen. Returns `false` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch_guest_session(&self, id: GuestSessionId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE storefront.guest_sessions SET last_seen_at = now() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete guest sessions (and, by cascade, their carts) idle since `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_idle_guest_sessions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.guest_sessions WHERE last_seen_at < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Find the owner's cart in a store, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_or_create(
        &self,
        store_id: StoreId,
        owner: CartOwner,
    ) -> Result<CartId, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_or_create_in(&mut conn, store_id, owner).await
    }

    /// Find the owner's existing cart in a store without creating one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(
        &self,
        store_id: StoreId,
        owner: CartOwner,
    ) -> Result<Option<CartId>, RepositoryError> {
        let id: Option<i32> = match owner {
            CartOwner::User(user_id) => {
                sqlx::query_scalar(
                    "SELECT id FROM storefront.carts WHERE store_id = $1 AND user_id = $2",
                )
                .bind(store_id)
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?
            }
            CartOwner::Guest(guest_id) => {
                sqlx::query_scalar(
                    "SELECT id FROM storefront.carts WHERE store_id = $1 AND guest_session_id = $2",
                )
                .bind(store_id)
                .bind(guest_id)
                .fetch_optional(self.pool)
                .await?
            }
        };

        Ok(id.map(CartId::new))
    }

    /// Load a full cart snapshot with its lines and totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist.
    /// Returns `RepositoryError::DataCorruption` if stored rows violate invariants.
    pub async fn load(&self, cart_id: CartId) -> Result<Cart, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT c.id, c.store_id, c.user_id, c.guest_session_id,
                   c.discount_amount, c.updated_at, s.currency
            FROM storefront.carts c
            JOIN storefront.stores s ON s.id = c.store_id
            WHERE c.id = $1
            ",
        )
        .bind(cart_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let items = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT ci.id, ci.product_id, p.name AS product_name, ci.quantity, ci.unit_price
            FROM storefront.cart_items ci
            JOIN storefront.products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(CartItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let owner = owner_from_columns(row.id, row.user_id, row.guest_session_id)?;
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("store {}: {e}", row.store_id))
        })?;

        Ok(Cart::assemble(
            CartId::new(row.id),
            StoreId::new(row.store_id),
            owner,
            currency,
            items,
            row.discount_amount,
            row.updated_at,
        ))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product to the owner's cart, snapshotting its current price.
    ///
    /// If the product is already in the cart its quantity is increased
    /// (capped at [`Quantity::MAX`]) and the original price snapshot is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn add_item(
        &self,
        store_id: StoreId,
        owner: CartOwner,
        product: &Product,
        quantity: Quantity,
    ) -> Result<CartId, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let cart_id = find_or_create_in(&mut tx, store_id, owner).await?;

        sqlx::query(
            r"
            INSERT INTO storefront.cart_items AS existing (cart_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id) DO UPDATE
                SET quantity = LEAST(existing.quantity + EXCLUDED.quantity, $5),
                    updated_at = now()
            ",
        )
        .bind(cart_id)
        .bind(product.id)
        .bind(i32::from(quantity))
        .bind(product.price)
        .bind(max_quantity())
        .execute(&mut *tx)
        .await?;

        touch_cart(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(cart_id)
    }

    /// Set the quantity of a line in the given cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    pub async fn set_item_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE storefront.cart_items
            SET quantity = $1, updated_at = now()
            WHERE id = $2 AND cart_id = $3
            ",
        )
        .bind(i32::from(quantity))
        .bind(item_id)
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        touch_cart(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove a line from the given cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM storefront.cart_items WHERE id = $1 AND cart_id = $2")
                .bind(item_id)
                .bind(cart_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        touch_cart(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove every line from the given cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM storefront.cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        touch_cart(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Merge every cart of a guest session into the user's carts.
    ///
    /// For each store the guest has a cart in, lines are moved into the user's
    /// cart for that store; quantities of products present in both are summed
    /// and the user's price snapshot is kept. The guest session and its carts
    /// are deleted afterwards. Returns the number of guest carts merged; an
    /// unknown guest session merges nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// merged in that case.
    pub async fn merge_guest_into_user(
        &self,
        guest_id: GuestSessionId,
        user_id: UserId,
    ) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let guest_carts: Vec<(i32, i32)> = sqlx::query_as(
            r"
            SELECT id, store_id
            FROM storefront.carts
            WHERE guest_session_id = $1
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(guest_id)
        .fetch_all(&mut *tx)
        .await?;

        for &(guest_cart_id, store_id) in &guest_carts {
            let user_cart_id =
                find_or_create_in(&mut tx, StoreId::new(store_id), CartOwner::User(user_id))
                    .await?;

            sqlx::query(
                r"
                INSERT INTO storefront.cart_items AS existing (cart_id, product_id, quantity, unit_price)
                SELECT $1, product_id, quantity, unit_price
                FROM storefront.cart_items
                WHERE cart_id = $2
                ON CONFLICT (cart_id, product_id) DO UPDATE
                    SET quantity = LEAST(existing.quantity + EXCLUDED.quantity, $3),
                        updated_at = now()
                ",
            )
            .bind(user_cart_id)
            .bind(guest_cart_id)
            .bind(max_quantity())
            .execute(&mut *tx)
            .await?;

            touch_cart(&mut tx, user_cart_id).await?;
        }

        // Cascades to the guest carts and their lines.
        sqlx::query("DELETE FROM storefront.guest_sessions WHERE id = $1")
            .bind(guest_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(guest_carts.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{Email, StoreSlug};

    use super::*;
    use crate::db::stores::StoreRepository;
    use crate::db::users::UserRepository;
    use crate::models::Store;

    #[test]
    fn test_owner_from_columns() {
        assert_eq!(
            owner_from_columns(1, Some(4), None).ok(),
            Some(CartOwner::User(UserId::new(4)))
        );

        let guest = Uuid::new_v4();
        assert_eq!(
            owner_from_columns(1, None, Some(guest)).ok(),
            Some(CartOwner::Guest(GuestSessionId::from_uuid(guest)))
        );

        assert!(matches!(
            owner_from_columns(1, None, None),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            owner_from_columns(1, Some(4), Some(guest)),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_item_row_rejects_zero_quantity() {
        let row = CartItemRow {
            id: 3,
            product_id: 9,
            product_name: "Mug".to_string(),
            quantity: 0,
            unit_price: Decimal::new(800, 2),
        };
        assert!(CartItem::try_from(row).is_err());
    }

    // =========================================================================
    // Database-backed tests (run with DATABASE_URL set)
    // =========================================================================

    async fn seed_store(pool: &PgPool, slug: &str) -> (Store, Product, Product) {
        let stores = StoreRepository::new(pool);
        let store = stores
            .upsert(&StoreSlug::parse(slug).unwrap(), slug, CurrencyCode::USD)
            .await
            .unwrap();
        let mug = stores
            .upsert_product(store.id, "Mug", Decimal::new(800, 2), true)
            .await
            .unwrap();
        let beans = stores
            .upsert_product(store.id, "Beans", Decimal::new(1450, 2), true)
            .await
            .unwrap();
        (store, mug, beans)
    }

    async fn seed_user(pool: &PgPool, email: &str) -> UserId {
        UserRepository::new(pool)
            .create_with_password(&Email::parse(email).unwrap(), "not-a-real-hash")
            .await
            .unwrap()
            .id
    }

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[sqlx::test(migrator = "crate::db::MIGRATOR")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_merge_sums_quantities_and_keeps_user_price(pool: PgPool) {
        let repo = CartRepository::new(&pool);
        let (store, mug, beans) = seed_store(&pool, "acme").await;
        let user = seed_user(&pool, "ann@example.com").await;
        let guest = repo.create_guest_session().await.unwrap();

        // User added the mug at 8.00; the guest added it after a price change
        repo.add_item(store.id, CartOwner::User(user), &mug, qty(2))
            .await
            .unwrap();
        let repriced = Product {
            price: Decimal::new(999, 2),
            ..mug.clone()
        };
        repo.add_item(store.id, CartOwner::Guest(guest), &repriced, qty(3))
            .await
            .unwrap();
        repo.add_item(store.id, CartOwner::Guest(guest), &beans, qty(1))
            .await
            .unwrap();

        let merged = repo.merge_guest_into_user(guest, user).await.unwrap();
        assert_eq!(merged, 1);

        let cart_id = repo.find(store.id, CartOwner::User(user)).await.unwrap().unwrap();
        let cart = repo.load(cart_id).await.unwrap();

        let mug_line = cart.line_for(mug.id).unwrap();
        assert_eq!(mug_line.quantity.get(), 5);
        assert_eq!(mug_line.unit_price, Decimal::new(800, 2));

        let beans_line = cart.line_for(beans.id).unwrap();
        assert_eq!(beans_line.quantity.get(), 1);
        assert_eq!(beans_line.unit_price, Decimal::new(1450, 2));

        // The guest session and its carts are gone
        assert!(!repo.touch_guest_session(guest).await.unwrap());
        assert_eq!(repo.find(store.id, CartOwner::Guest(guest)).await.unwrap(), None);
    }

    #[sqlx::test(migrator = "crate::db::MIGRATOR")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_merge_caps_quantity_and_covers_every_store(pool: PgPool) {
        let repo = CartRepository::new(&pool);
        let (acme, acme_mug, _) = seed_store(&pool, "acme").await;
        let (tea, _, tea_beans) = seed_store(&pool, "tea-house").await;
        let user = seed_user(&pool, "ann@example.com").await;
        let guest = repo.create_guest_session().await.unwrap();

        repo.add_item(acme.id, CartOwner::User(user), &acme_mug, qty(9_000))
            .await
            .unwrap();
        repo.add_item(acme.id, CartOwner::Guest(guest), &acme_mug, qty(2_000))
            .await
            .unwrap();
        repo.add_item(tea.id, CartOwner::Guest(guest), &tea_beans, qty(4))
            .await
            .unwrap();

        assert_eq!(repo.merge_guest_into_user(guest, user).await.unwrap(), 2);

        let acme_cart = repo.find(acme.id, CartOwner::User(user)).await.unwrap().unwrap();
        let acme_cart = repo.load(acme_cart).await.unwrap();
        assert_eq!(
            acme_cart.line_for(acme_mug.id).unwrap().quantity.get(),
            Quantity::MAX
        );

        let tea_cart = repo.find(tea.id, CartOwner::User(user)).await.unwrap().unwrap();
        let tea_cart = repo.load(tea_cart).await.unwrap();
        assert_eq!(tea_cart.owner, CartOwner::User(user));
        assert_eq!(tea_cart.line_for(tea_beans.id).unwrap().quantity.get(), 4);
    }

    #[sqlx::test(migrator = "crate::db::MIGRATOR")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_merge_unknown_guest_leaves_user_cart_alone(pool: PgPool) {
        let repo = CartRepository::new(&pool);
        let (store, mug, _) = seed_store(&pool, "acme").await;
        let user = seed_user(&pool, "ann@example.com").await;

        let cart_id = repo
            .add_item(store.id, CartOwner::User(user), &mug, qty(2))
            .await
            .unwrap();
        let before = repo.load(cart_id).await.unwrap();

        let merged = repo
            .merge_guest_into_user(GuestSessionId::generate(), user)
            .await
            .unwrap();
        assert_eq!(merged, 0);

        let after = repo.load(cart_id).await.unwrap();
        assert_eq!(after.items, before.items);
    }

    #[sqlx::test(migrator = "crate::db::MIGRATOR")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_line_outside_cart_is_not_found(pool: PgPool) {
        let repo = CartRepository::new(&pool);
        let (store, mug, _) = seed_store(&pool, "acme").await;
        let ann = seed_user(&pool, "ann@example.com").await;
        let bob = seed_user(&pool, "bob@example.com").await;

        let ann_cart = repo
            .add_item(store.id, CartOwner::User(ann), &mug, qty(1))
            .await
            .unwrap();
        let ann_line = repo.load(ann_cart).await.unwrap().items[0].id;
        let bob_cart = repo.find_or_create(store.id, CartOwner::User(bob)).await.unwrap();

        assert!(matches!(
            repo.set_item_quantity(bob_cart, ann_line, qty(5)).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            repo.remove_item(bob_cart, ann_line).await,
            Err(RepositoryError::NotFound)
        ));

        let untouched = repo.load(ann_cart).await.unwrap();
        assert_eq!(untouched.items[0].quantity.get(), 1);
    }

    #[sqlx::test(migrator = "crate::db::MIGRATOR")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_find_does_not_create(pool: PgPool) {
        let repo = CartRepository::new(&pool);
        let (store, _, _) = seed_store(&pool, "acme").await;
        let user = seed_user(&pool, "ann@example.com").await;

        assert_eq!(repo.find(store.id, CartOwner::User(user)).await.unwrap(), None);
        let created = repo.find_or_create(store.id, CartOwner::User(user)).await.unwrap();
        assert_eq!(
            repo.find(store.id, CartOwner::User(user)).await.unwrap(),
            Some(created)
        );
    }

    #[sqlx::test(migrator = "crate::db::MIGRATOR")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_cart_requires_exactly_one_owner(pool: PgPool) {
        let repo = CartRepository::new(&pool);
        let (store, _, _) = seed_store(&pool, "acme").await;
        let user = seed_user(&pool, "ann@example.com").await;
        let guest = repo.create_guest_session().await.unwrap();

        let neither = sqlx::query("INSERT INTO storefront.carts (store_id) VALUES ($1)")
            .bind(store.id)
            .execute(&pool)
            .await;
        assert!(neither.is_err());

        let both = sqlx::query(
            "INSERT INTO storefront.carts (store_id, user_id, guest_session_id) VALUES ($1, $2, $3)",
        )
        .bind(store.id)
        .bind(user)
        .bind(guest)
        .execute(&pool)
        .await;
        assert!(both.is_err());
    }
}
