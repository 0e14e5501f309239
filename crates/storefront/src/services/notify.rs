//! Cart-change notification relay.
//!
//! Posts the user's serialized cart to `MONITORING_URL/notify`. The
//! background path logs failures and moves on; `POST /event/cart-update`
//! calls the same method synchronously and reports the outcome.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;
use url::Url;

use cartwise_core::UserId;

use super::cart::load_cart_detail;
use crate::config::{MonitoringConfig, join_url};
use crate::db::{CartStore, RepositoryError};

/// Errors from the notification relay.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No monitoring URL is configured.
    #[error("monitoring relay is not configured")]
    NotConfigured,

    /// The user has no cart to report.
    #[error("cart not found")]
    CartNotFound,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The relay answered with a non-success status.
    #[error("monitoring relay returned status {0}")]
    Status(u16),

    /// Store failure while loading the cart.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Sends cart snapshots to the monitoring endpoint.
#[derive(Clone)]
pub struct NotificationRelay {
    client: reqwest::Client,
    notify_url: Option<Url>,
    carts: Arc<dyn CartStore>,
}

impl NotificationRelay {
    /// Create a relay posting to `config.base_url`, bounded by `config.timeout`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Http` if the HTTP client cannot be built.
    pub fn new(config: &MonitoringConfig, carts: Arc<dyn CartStore>) -> Result<Self, NotifyError> {
        let notify_url = match &config.base_url {
            Some(base) => match join_url(base, "notify") {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid monitoring URL, notifications disabled");
                    None
                }
            },
            None => None,
        };

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            notify_url,
            carts,
        })
    }

    /// Whether a monitoring URL is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.notify_url.is_some()
    }

    /// Post the user's current cart to the relay.
    ///
    /// # Errors
    ///
    /// - `NotifyError::NotConfigured` if no monitoring URL is set
    /// - `NotifyError::CartNotFound` if the user has no cart
    /// - `NotifyError::Http` / `NotifyError::Status` for delivery failures
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn notify_cart_change(&self, user_id: UserId) -> Result<(), NotifyError> {
        let url = self.notify_url.as_ref().ok_or(NotifyError::NotConfigured)?;

        let cart = load_cart_detail(self.carts.as_ref(), user_id)
            .await?
            .ok_or(NotifyError::CartNotFound)?;

        let response = self.client.post(url.clone()).json(&cart).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::debug!(items = cart.distinct_items(), "Cart change delivered");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::{Duration, Instant};

    use axum::{Router, routing::post};
    use tokio::net::TcpListener;

    use super::*;
    use crate::db::MemoryStore;

    fn config(base_url: Option<Url>, timeout: Duration) -> MonitoringConfig {
        MonitoringConfig { base_url, timeout }
    }

    #[tokio::test]
    async fn test_unconfigured_relay() {
        let relay = NotificationRelay::new(
            &MonitoringConfig::default(),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        assert!(!relay.is_configured());
        assert!(matches!(
            relay.notify_cart_change(UserId::new(1)).await,
            Err(NotifyError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_missing_cart() {
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let relay = NotificationRelay::new(
            &config(Some(base), Duration::from_secs(5)),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        assert!(relay.is_configured());
        assert!(matches!(
            relay.notify_cart_change(UserId::new(1)).await,
            Err(NotifyError::CartNotFound)
        ));
    }

    #[tokio::test]
    async fn test_slow_relay_hits_configured_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let slow = Router::new().route(
            "/notify",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        tokio::spawn(async move { axum::serve(listener, slow).await.unwrap() });

        let store = Arc::new(MemoryStore::new());
        store.get_or_create_cart(UserId::new(1)).await.unwrap();
        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let relay = NotificationRelay::new(
            &config(Some(base), Duration::from_millis(200)),
            store,
        )
        .unwrap();

        let started = Instant::now();
        let result = relay.notify_cart_change(UserId::new(1)).await;
        assert!(matches!(result, Err(NotifyError::Http(ref e)) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
