//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                - Liveness
//! GET    /health/ready          - Readiness (store ping)
//!
//! # Products
//! GET    /products              - Full catalog
//!
//! # Cart (requires auth)
//! GET    /cart                  - Cart with items and products
//! POST   /cart/add              - Add {product_id, quantity}
//! DELETE /cart/delete           - Remove {product_id}
//!
//! # Suggestions (requires auth)
//! GET    /suggestions           - Refresh from the recommendation service
//! GET    /suggestions/stored    - Last stored set
//! GET    /suggestions/available - Whether a stored set exists
//! DELETE /suggestions/clear     - Drop the stored set
//!
//! # Events (requires auth)
//! POST   /event/cart-update     - Synchronous cart-change notification
//! ```

pub mod cart;
pub mod events;
pub mod health;
pub mod products;
pub mod suggestions;

use axum::{
    Router,
    extract::Request,
    middleware::from_fn,
    routing::{delete, get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// A bare `{"message": ...}` body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    #[must_use]
    pub const fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/delete", delete(cart::remove))
}

/// Create the suggestion routes router.
pub fn suggestion_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(suggestions::refresh))
        .route("/stored", get(suggestions::stored))
        .route("/available", get(suggestions::available))
        .route("/clear", delete(suggestions::clear))
}

/// Create all application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/products", get(products::index))
        .route("/event/cart-update", post(events::cart_update))
        .nest("/cart", cart_routes())
        .nest("/suggestions", suggestion_routes())
}

/// The full router with tracing and request ids, bound to `state`.
///
/// Session and Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
                user_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}
