//! Suggestion route handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use super::MessageResponse;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::Suggestion;
use crate::state::AppState;

/// A list of suggestions.
#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
}

/// Whether stored suggestions exist.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// Refresh suggestions synchronously and return the new set.
///
/// Upstream failures surface as 502 here, unlike the background path.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn refresh(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<SuggestionsResponse>> {
    let suggestions = state.suggestions().refresh(user.id).await?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

/// Return the most recently stored set without calling upstream.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn stored(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<SuggestionsResponse>> {
    let suggestions = state.suggestions().stored(user.id).await?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

/// Report whether a stored set exists.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn available(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<AvailabilityResponse>> {
    let available = state.suggestions().available(user.id).await?;
    Ok(Json(AvailabilityResponse { available }))
}

/// Delete every stored suggestion for the caller.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<MessageResponse>> {
    state.suggestions().clear(user.id).await?;
    Ok(Json(MessageResponse::new("Suggestions cleared")))
}
