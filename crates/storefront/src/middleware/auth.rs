//! Caller identity extraction.
//!
//! Login and registration live outside this service. Identity arrives one of
//! two ways:
//!
//! 1. A fronting auth layer inserts a [`CurrentUser`] into request extensions.
//! 2. The `tower-sessions` session carries one under `current_user`.
//!
//! Handlers take [`RequireUser`] and can assume the id is already validated.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, session_keys};

/// Extractor that requires an authenticated caller.
///
/// Rejects with a 401 JSON body when no identity is present.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> String {
///     format!("user {}", user.id)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<CurrentUser>() {
            Some(user) => Some(*user),
            None => session_user(parts).await,
        };

        let user = user.ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
        set_sentry_user(&user.id);
        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        Ok(Self(user))
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}
