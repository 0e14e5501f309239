//! Store adapters for the storefront `PostgreSQL` database.
//!
//! # Database: `cartwise`
//!
//! ## Tables (schema `storefront`)
//!
//! - `product` - Read-only catalog
//! - `cart` - One per user (`UNIQUE (user_id)`)
//! - `cart_item` - One per (cart, product) (`UNIQUE (cart_id, product_id)`, `quantity >= 1`)
//! - `suggestion` - Latest recommendation set per user
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Store seams
//!
//! Services depend on the [`CartStore`], [`ProductCatalog`], and
//! [`SuggestionStore`] traits rather than on a pool, so the same logic runs
//! against `PostgreSQL` in production and [`MemoryStore`] in tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p cartwise-cli -- migrate storefront
//! ```

pub mod carts;
pub mod memory;
pub mod products;
pub mod suggestions;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use cartwise_core::{CartId, ProductId, Quantity, UserId};

use crate::models::{Cart, CartItem, CartLine, Product, Suggestion, SuggestionDraft};

pub use carts::PgCartRepository;
pub use memory::MemoryStore;
pub use products::PgProductRepository;
pub use suggestions::PgSuggestionRepository;

/// Errors raised by store adapters.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The referenced row does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated in a way the adapter could not resolve.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value failed validation on the way out.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// The pool size bounds the number of concurrent outstanding queries.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Cart and cart-item persistence.
///
/// Implementations must make [`get_or_create_cart`](Self::get_or_create_cart)
/// and [`upsert_item`](Self::upsert_item) safe under concurrent first-time
/// adds: at most one cart per user and one item per (cart, product).
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Fetch the user's cart, if any.
    async fn find_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError>;

    /// Fetch the user's cart, creating an empty one if absent. Idempotent.
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError>;

    /// Increment the (cart, product) line by `delta`, inserting it if absent.
    ///
    /// Returns `RepositoryError::NotFound` if the cart or product does not exist.
    async fn upsert_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        delta: Quantity,
    ) -> Result<CartItem, RepositoryError>;

    /// Delete the (cart, product) line. Returns whether a row was removed.
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist.
    async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;

    /// All lines of a cart with their products joined, oldest first.
    async fn list_items(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Cheap connectivity check used by the readiness endpoint.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Every product, ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// A single product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// Persistence for the most recent suggestion set per user.
#[async_trait]
pub trait SuggestionStore: Send + Sync {
    /// Replace the user's suggestions with `drafts`, returning the stored records.
    async fn store(
        &self,
        user_id: UserId,
        drafts: &[SuggestionDraft],
    ) -> Result<Vec<Suggestion>, RepositoryError>;

    /// The user's stored suggestions, empty if none.
    async fn get(&self, user_id: UserId) -> Result<Vec<Suggestion>, RepositoryError>;

    /// Whether any suggestions are stored for the user.
    async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError>;

    /// Delete every stored suggestion for the user. Returns the number removed.
    async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError>;
}

/// The full set of store handles the services need.
#[derive(Clone)]
pub struct Stores {
    pub carts: Arc<dyn CartStore>,
    pub products: Arc<dyn ProductCatalog>,
    pub suggestions: Arc<dyn SuggestionStore>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            products: Arc::new(PgProductRepository::new(pool.clone())),
            suggestions: Arc::new(PgSuggestionRepository::new(pool.clone())),
        }
    }

    /// All three seams served by one in-process store.
    #[must_use]
    pub fn memory(store: &Arc<MemoryStore>) -> Self {
        Self {
            carts: store.clone(),
            products: store.clone(),
            suggestions: store.clone(),
        }
    }
}

/// Whether a sqlx error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Whether a sqlx error is a foreign-key violation.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
