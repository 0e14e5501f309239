//! Event route handlers.

use axum::{Json, extract::State};
use tracing::instrument;

use super::MessageResponse;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Push the caller's cart to the monitoring relay and wait for delivery.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cart_update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<MessageResponse>> {
    state.relay().notify_cart_change(user.id).await?;
    Ok(Json(MessageResponse::new("Cart updated successfully")))
}
