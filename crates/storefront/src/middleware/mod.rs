//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (record on span, echo in response)
//! 4. Session layer (tower-sessions with `PostgreSQL` store, when a pool exists)
//!
//! Identity is resolved per handler by the [`RequireUser`] extractor.

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::RequireUser;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use session::create_session_layer;
