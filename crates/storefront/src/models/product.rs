//! Catalog product (read-only from the cart's perspective).

use serde::{Deserialize, Serialize};

use cartwise_core::{Price, ProductId};

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    /// Comma-delimited informal tags, e.g. `"vegan,spicy"`.
    pub tags: String,
}
