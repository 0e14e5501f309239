//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; the body is always `{"error": "<message>"}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::mco::McoError;
use crate::services::{CartError, NotifyError, SuggestionError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// An upstream service is unset, unreachable, or answered with an error.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An upstream service replied with something we could not decode.
    #[error("Upstream parse error: {0}")]
    UpstreamParse(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnavailable(_) | Self::UpstreamParse(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.status().is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) => "Internal server error".to_string(),
            Self::UpstreamUnavailable(_) => "Recommendation service unavailable".to_string(),
            Self::UpstreamParse(_) => "Recommendation service returned an invalid reply".to_string(),
            _ => self.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<McoError> for AppError {
    fn from(err: McoError) -> Self {
        if err.is_parse() {
            Self::UpstreamParse(err.to_string())
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity(e) => Self::Validation(e.to_string()),
            CartError::ProductNotFound(_) => Self::NotFound("Product not found".to_string()),
            CartError::CartNotFound => Self::NotFound("Cart not found".to_string()),
            CartError::ItemNotFound(_) => Self::NotFound("Item not found in cart".to_string()),
            CartError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<SuggestionError> for AppError {
    fn from(err: SuggestionError) -> Self {
        match err {
            SuggestionError::CartNotFound => Self::NotFound("Cart not found".to_string()),
            SuggestionError::Upstream(e) => e.into(),
            SuggestionError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::CartNotFound => Self::NotFound("Cart not found".to_string()),
            NotifyError::Repository(e) => Self::Database(e),
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the auth extractor so errors are associated with the caller.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cartwise_core::{ProductId, Quantity};
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::UpstreamUnavailable("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::UpstreamParse("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_service_error_mapping() {
        let invalid = Quantity::new(0).unwrap_err();
        assert!(matches!(
            AppError::from(CartError::InvalidQuantity(invalid)),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(CartError::ItemNotFound(ProductId::new(1))),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(McoError::Parse("bad".into())),
            AppError::UpstreamParse(_)
        ));
        assert!(matches!(
            AppError::from(McoError::Status(500)),
            AppError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            AppError::from(NotifyError::NotConfigured),
            AppError::UpstreamUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_body_is_json_and_hides_internals() {
        let (status, body) = body_json(AppError::NotFound("Cart not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Cart not found"}));

        let (status, body) = body_json(AppError::Database(
            RepositoryError::DataCorruption("quantity -3 in cart_item 9".into()),
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(!body.to_string().contains("cart_item"));
    }
}
