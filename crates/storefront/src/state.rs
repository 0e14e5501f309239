//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Stores;
use crate::mco::{McoClient, McoError};
use crate::services::{
    BackgroundQueue, CartService, JobRunner, NotificationRelay, NotifyError, SuggestionService,
};

/// Error assembling the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("recommendation client: {0}")]
    Mco(#[from] McoError),
    #[error("notification relay: {0}")]
    Notify(#[from] NotifyError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Store handles are injected
/// rather than global, so the same router runs against `PostgreSQL` or the
/// in-process store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    stores: Stores,
    carts: CartService,
    suggestions: SuggestionService,
    relay: NotificationRelay,
}

impl AppState {
    /// Wire services over `stores`, sending follow-up work to `queue`.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if an outbound HTTP client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        stores: Stores,
        queue: BackgroundQueue,
    ) -> Result<Self, StateError> {
        let mco = McoClient::new(&config.mco)?;
        if !mco.is_configured() {
            tracing::warn!("MCO_URL not set, suggestion refreshes will fail");
        }

        let relay = NotificationRelay::new(&config.monitoring, stores.carts.clone())?;

        let suggestions = SuggestionService::new(
            stores.carts.clone(),
            stores.products.clone(),
            stores.suggestions.clone(),
            mco,
            config.suggestions.cache_ttl,
        );

        let carts = CartService::new(
            stores.carts.clone(),
            stores.products.clone(),
            queue,
            config.suggestions.threshold,
            relay.is_configured(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                stores,
                carts,
                suggestions,
                relay,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the store handles.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    /// Get the cart mutation service.
    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    /// Get the suggestion service.
    #[must_use]
    pub fn suggestions(&self) -> &SuggestionService {
        &self.inner.suggestions
    }

    /// Get the cart-change notification relay.
    #[must_use]
    pub fn relay(&self) -> &NotificationRelay {
        &self.inner.relay
    }

    /// A job handler sharing this state's services, for the worker pool.
    #[must_use]
    pub fn job_runner(&self) -> JobRunner {
        JobRunner::new(self.inner.suggestions.clone(), self.inner.relay.clone())
    }
}
