//! Cart route handlers.
//!
//! All handlers require an authenticated caller and speak JSON.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cartwise_core::ProductId;

use super::MessageResponse;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::{CartDetail, CartItem};
use crate::state::AppState;

/// Body of `POST /cart/add`.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    /// Validated by the service so out-of-range values map to a 400.
    pub quantity: i64,
}

/// Body of `DELETE /cart/delete`.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
}

/// Response of `POST /cart/add`.
#[derive(Debug, Serialize)]
pub struct AddToCartResponse {
    pub message: &'static str,
    pub item: CartItem,
}

/// Show the caller's cart with every line and product.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartDetail>> {
    let cart = state.carts().get_cart(user.id).await?;
    Ok(Json(cart))
}

/// Add a product to the caller's cart, creating the cart if needed.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<AddToCartResponse>> {
    let Json(request) = payload?;

    let outcome = state
        .carts()
        .add_to_cart(user.id, request.product_id, request.quantity)
        .await?;

    Ok(Json(AddToCartResponse {
        message: "Item added to cart",
        item: outcome.item,
    }))
}

/// Remove a product line from the caller's cart.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<RemoveFromCartRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(request) = payload?;

    state
        .carts()
        .remove_from_cart(user.id, request.product_id)
        .await?;

    Ok(Json(MessageResponse::new("Item removed")))
}
