//! Cart domain types.
//!
//! A user owns at most one [`Cart`]; each [`CartItem`] pairs the cart with a
//! single product and a quantity of at least one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartwise_core::{CartId, CartItemId, ProductId, Quantity, UserId};

use super::Product;

/// A user's cart header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart item joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Product,
}

/// A cart with every line and its product detail.
///
/// This is both the `GET /cart` response body and the payload posted to the
/// monitoring relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDetail {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartLine>,
}

impl CartDetail {
    /// Number of distinct products in the cart.
    #[must_use]
    pub fn distinct_items(&self) -> usize {
        self.items.len()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.items
            .iter()
            .map(|line| i64::from(line.item.quantity.get()))
            .sum()
    }

    /// Product names in cart order, as sent to the recommendation service.
    #[must_use]
    pub fn product_names(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|line| line.product.name.clone())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cartwise_core::Price;
    use rust_decimal::Decimal;

    fn line(id: i32, name: &str, cents: i64, quantity: i64) -> CartLine {
        let now = Utc::now();
        CartLine {
            item: CartItem {
                id: CartItemId::new(id),
                cart_id: CartId::new(1),
                product_id: ProductId::new(id),
                quantity: Quantity::new(quantity).unwrap(),
                created_at: now,
                updated_at: now,
            },
            product: Product {
                id: ProductId::new(id),
                name: name.to_string(),
                price: Price::new(Decimal::new(cents, 2)).unwrap(),
                tags: String::new(),
            },
        }
    }

    fn detail(items: Vec<CartLine>) -> CartDetail {
        let now = Utc::now();
        CartDetail {
            cart: Cart {
                id: CartId::new(1),
                user_id: UserId::new(7),
                created_at: now,
                updated_at: now,
            },
            items,
        }
    }

    #[test]
    fn test_totals() {
        let cart = detail(vec![line(1, "pasta", 250, 2), line(2, "eggs", 399, 1)]);
        assert_eq!(cart.distinct_items(), 2);
        assert_eq!(cart.total_quantity(), 3);
        assert_eq!(cart.product_names(), ["pasta", "eggs"]);
    }

    #[test]
    fn test_serialized_shape_is_flat() {
        let cart = detail(vec![line(1, "pasta", 250, 2)]);
        let json = serde_json::to_value(&cart).unwrap();

        assert_eq!(json["user_id"], 7);
        assert_eq!(json["items"][0]["product_id"], 1);
        assert_eq!(json["items"][0]["quantity"], 2);
        assert_eq!(json["items"][0]["product"]["name"], "pasta");
        assert_eq!(json["items"][0]["product"]["price"], "2.50");
    }
}
