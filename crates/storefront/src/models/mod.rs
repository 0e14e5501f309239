//! Domain models for the storefront.
//!
//! These are plain data holders. Conversion to and from database rows lives in
//! the store adapters under [`crate::db`].

pub mod cart;
pub mod product;
pub mod session;
pub mod suggestion;

pub use cart::{Cart, CartDetail, CartItem, CartLine};
pub use product::Product;
pub use session::{CurrentUser, keys as session_keys};
pub use suggestion::{Suggestion, SuggestionDraft, decode_items, encode_items};
