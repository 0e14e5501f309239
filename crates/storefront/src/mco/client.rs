//! HTTP client for the recommendation service.

use std::sync::Arc;

use tracing::instrument;
use url::Url;

use cartwise_core::UserId;

use super::decode::SuggestionDecoder;
use super::error::McoError;
use super::types::RunRequest;
use crate::config::{McoConfig, join_url};
use crate::models::SuggestionDraft;

/// Recommendation service client.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct McoClient {
    inner: Arc<McoClientInner>,
}

struct McoClientInner {
    client: reqwest::Client,
    run_url: Option<Url>,
    app_name: String,
    decoder: SuggestionDecoder,
}

impl McoClient {
    /// Create a new client from configuration.
    ///
    /// An unset base URL is not an error here; every call then fails with
    /// `McoError::Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns `McoError::Unavailable` if the run URL cannot be derived from
    /// the base URL, or `McoError::Http` if the HTTP client cannot be built.
    pub fn new(config: &McoConfig) -> Result<Self, McoError> {
        let run_url = config
            .base_url
            .as_ref()
            .map(|base| join_url(base, "run"))
            .transpose()
            .map_err(|e| McoError::Unavailable(format!("invalid MCO_URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(McoClientInner {
                client,
                run_url,
                app_name: config.app_name.clone(),
                decoder: SuggestionDecoder::default(),
            }),
        })
    }

    /// Whether a base URL is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.run_url.is_some()
    }

    /// Ask the service for suggestions given the user's cart and the catalog.
    ///
    /// # Errors
    ///
    /// - `McoError::Unavailable` if no base URL is configured
    /// - `McoError::Http` if the request fails or times out
    /// - `McoError::Status` for a non-success reply
    /// - `McoError::Parse` if the reply cannot be decoded
    #[instrument(
        skip(self, cart_items, stock_items),
        fields(user_id = %user_id, cart = cart_items.len(), stock = stock_items.len())
    )]
    pub async fn suggest(
        &self,
        user_id: UserId,
        cart_items: &[String],
        stock_items: &[String],
    ) -> Result<Vec<SuggestionDraft>, McoError> {
        let url = self
            .inner
            .run_url
            .as_ref()
            .ok_or_else(|| McoError::Unavailable("MCO_URL is not set".to_owned()))?;

        let request = RunRequest::new(&self.inner.app_name, user_id, cart_items, stock_items);

        let response = self
            .inner
            .client
            .post(url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Recommendation service returned error status");
            return Err(McoError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        self.inner.decoder.decode(&body)
    }
}

impl std::fmt::Debug for McoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McoClient")
            .field("run_url", &self.inner.run_url.as_ref().map(Url::as_str))
            .field("app_name", &self.inner.app_name)
            .field("decoder", &self.inner.decoder)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_is_unavailable() {
        let client = McoClient::new(&McoConfig::default()).unwrap();
        assert!(!client.is_configured());

        let err = client.suggest(UserId::new(7), &[], &[]).await.unwrap_err();
        assert!(matches!(err, McoError::Unavailable(_)));
    }

    #[test]
    fn test_run_url_is_derived_from_base() {
        let config = McoConfig {
            base_url: Some(Url::parse("http://mco.internal:8000").unwrap()),
            ..McoConfig::default()
        };
        let client = McoClient::new(&config).unwrap();
        assert_eq!(
            client.inner.run_url.as_ref().unwrap().as_str(),
            "http://mco.internal:8000/run"
        );
    }
}
