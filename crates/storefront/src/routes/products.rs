//! Product catalog route handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::error::Result;
use crate::models::Product;
use crate::state::AppState;

/// Response of `GET /products`.
#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

/// List the full catalog. Does not require authentication.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<ProductsResponse>> {
    let products = state.stores().products.list_products().await?;
    Ok(Json(ProductsResponse { products }))
}
