//! Cart repository for database operations.
//!
//! Concurrent first-time adds are resolved by the `cart.user_id` and
//! `cart_item (cart_id, product_id)` unique constraints rather than by locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use cartwise_core::{CartId, CartItemId, Price, ProductId, Quantity, UserId};

use super::{CartStore, RepositoryError, is_foreign_key_violation, is_unique_violation};
use crate::models::{Cart, CartItem, CartLine, Product};

/// `PostgreSQL`-backed [`CartStore`].
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn touch(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE storefront.cart SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id.as_i32())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn cart_exists(&self, cart_id: CartId) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM storefront.cart WHERE id = $1)")
                .bind(cart_id.as_i32())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl CartStore for PgCartRepository {
    #[instrument(skip(self))]
    async fn find_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, user_id, created_at, updated_at
            FROM storefront.cart
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    #[instrument(skip(self))]
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        if let Some(cart) = self.find_cart(user_id).await? {
            return Ok(cart);
        }

        let inserted = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO storefront.cart (user_id)
            VALUES ($1)
            RETURNING id, user_id, created_at, updated_at
            ",
        )
        .bind(user_id.as_i32())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(row.into()),
            // Lost the race to a concurrent insert; the winner's row is authoritative.
            Err(e) if is_unique_violation(&e) => self.find_cart(user_id).await?.ok_or_else(|| {
                RepositoryError::Conflict(format!("cart for user {user_id} vanished after conflict"))
            }),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn upsert_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        delta: Quantity,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO storefront.cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = storefront.cart_item.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING id, cart_id, product_id, quantity, created_at, updated_at
            ",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .bind(delta.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        self.touch(cart_id).await?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_item
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart_id.as_i32())
        .bind(product_id.as_i32())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            self.touch(cart_id).await?;
            return Ok(true);
        }

        if self.cart_exists(cart_id).await? {
            Ok(false)
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    #[instrument(skip(self))]
    async fn list_items(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.cart_id, ci.product_id, ci.quantity,
                   ci.created_at, ci.updated_at,
                   p.name AS product_name, p.price AS product_price, p.tags AS product_tags
            FROM storefront.cart_item ci
            JOIN storefront.product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(cart_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct CartRow {
    id: i32,
    user_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartId::new(row.id),
            user_id: UserId::new(row.user_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    cart_id: i32,
    product_id: i32,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::new(i64::from(row.quantity)).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid quantity in database: {e}"))
        })?;

        Ok(Self {
            id: CartItemId::new(row.id),
            cart_id: CartId::new(row.cart_id),
            product_id: ProductId::new(row.product_id),
            quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    #[sqlx(flatten)]
    item: CartItemRow,
    product_name: String,
    product_price: Decimal,
    product_tags: String,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.product_price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price in database: {e}"))
        })?;
        let product = Product {
            id: ProductId::new(row.item.product_id),
            name: row.product_name,
            price,
            tags: row.product_tags,
        };

        Ok(Self {
            item: row.item.try_into()?,
            product,
        })
    }
}
