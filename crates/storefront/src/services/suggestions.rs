//! Suggestion refresh and retrieval.
//!
//! Stored sets are read through a short-lived `moka` cache keyed by user and
//! write generation. Every write path (refresh, clear) bumps the user's
//! generation after the store write lands, so a read that raced the write
//! can only fill an entry no later read will look up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tracing::{info, instrument};

use cartwise_core::UserId;

use super::cart::load_cart_detail;
use crate::db::{CartStore, ProductCatalog, RepositoryError, SuggestionStore};
use crate::mco::{McoClient, McoError};
use crate::models::Suggestion;

/// Errors from suggestion operations.
#[derive(Debug, Error)]
pub enum SuggestionError {
    /// The user has no cart to base suggestions on.
    #[error("cart not found")]
    CartNotFound,

    /// The recommendation service failed or replied with garbage.
    #[error(transparent)]
    Upstream(#[from] McoError),

    /// Store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Coordinates the recommendation client with the suggestion store.
#[derive(Clone)]
pub struct SuggestionService {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductCatalog>,
    store: Arc<dyn SuggestionStore>,
    mco: McoClient,
    cache: Cache<(UserId, u64), Arc<Vec<Suggestion>>>,
    generations: Arc<Mutex<HashMap<UserId, u64>>>,
}

impl SuggestionService {
    /// Create a suggestion service whose cache entries live for `cache_ttl`.
    #[must_use]
    pub fn new(
        carts: Arc<dyn CartStore>,
        products: Arc<dyn ProductCatalog>,
        store: Arc<dyn SuggestionStore>,
        mco: McoClient,
        cache_ttl: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(cache_ttl)
            .build();

        Self {
            carts,
            products,
            store,
            mco,
            cache,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Ask the recommendation service for fresh suggestions and store them.
    ///
    /// The stored set replaces whatever the user had before.
    ///
    /// # Errors
    ///
    /// - `SuggestionError::CartNotFound` if the user has no cart
    /// - `SuggestionError::Upstream` if the service is unavailable or its
    ///   reply cannot be decoded
    /// - `SuggestionError::Repository` for store failures
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn refresh(&self, user_id: UserId) -> Result<Vec<Suggestion>, SuggestionError> {
        let cart = load_cart_detail(self.carts.as_ref(), user_id)
            .await?
            .ok_or(SuggestionError::CartNotFound)?;

        let stock: Vec<String> = self
            .products
            .list_products()
            .await?
            .into_iter()
            .map(|product| product.name)
            .collect();

        let drafts = self
            .mco
            .suggest(user_id, &cart.product_names(), &stock)
            .await?;

        let stored = self.store.store(user_id, &drafts).await?;
        self.retire_cached(user_id).await;

        info!(count = stored.len(), "Suggestions refreshed");
        Ok(stored)
    }

    /// The most recently stored suggestions, empty if none.
    ///
    /// # Errors
    ///
    /// Returns `SuggestionError::Repository` if the store query fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn stored(&self, user_id: UserId) -> Result<Vec<Suggestion>, SuggestionError> {
        // The generation must be read before the store.
        let key = (user_id, self.generation(user_id));
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit.as_ref().clone());
        }

        let stored = self.store.get(user_id).await?;
        self.cache.insert(key, Arc::new(stored.clone())).await;
        Ok(stored)
    }

    /// Whether any suggestions are stored for the user.
    ///
    /// # Errors
    ///
    /// Returns `SuggestionError::Repository` if the store query fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn available(&self, user_id: UserId) -> Result<bool, SuggestionError> {
        let key = (user_id, self.generation(user_id));
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(!hit.is_empty());
        }
        Ok(self.store.exists(user_id).await?)
    }

    /// Delete every stored suggestion for the user.
    ///
    /// # Errors
    ///
    /// Returns `SuggestionError::Repository` if the delete fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: UserId) -> Result<(), SuggestionError> {
        let removed = self.store.clear(user_id).await?;
        self.retire_cached(user_id).await;
        info!(removed, "Suggestions cleared");
        Ok(())
    }

    fn generation(&self, user_id: UserId) -> u64 {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    /// Move the user to a new generation and drop the entry of the old one.
    ///
    /// Must only run after the store write has completed.
    async fn retire_cached(&self, user_id: UserId) {
        let previous = {
            let mut generations = self
                .generations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let generation = generations.entry(user_id).or_insert(0);
            let previous = *generation;
            *generation = previous.wrapping_add(1);
            previous
        };
        self.cache.invalidate(&(user_id, previous)).await;
    }
}
