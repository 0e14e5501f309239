//! In-process store used by tests and database-less local runs.
//!
//! Every operation takes a single mutex for its whole duration, which gives
//! the same uniqueness guarantees the `PostgreSQL` constraints provide.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use cartwise_core::{CartId, CartItemId, ProductId, Quantity, SuggestionId, UserId};

use super::{CartStore, ProductCatalog, RepositoryError, SuggestionStore};
use crate::models::{Cart, CartItem, CartLine, Product, Suggestion, SuggestionDraft};

#[derive(Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    carts: HashMap<UserId, Cart>,
    items: Vec<CartItem>,
    suggestions: HashMap<UserId, Vec<Suggestion>>,
    next_cart_id: i32,
    next_item_id: i32,
    next_suggestion_id: i32,
}

impl State {
    fn cart_by_id(&self, cart_id: CartId) -> Option<&Cart> {
        self.carts.values().find(|cart| cart.id == cart_id)
    }

    fn touch(&mut self, cart_id: CartId) {
        let now = Utc::now();
        if let Some(cart) = self.carts.values_mut().find(|cart| cart.id == cart_id) {
            cart.updated_at = now;
        }
    }
}

/// A [`CartStore`], [`ProductCatalog`], and [`SuggestionStore`] held in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose catalog is pre-loaded with `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        for product in products {
            store.insert_product(product);
        }
        store
    }

    /// Add or replace a catalog entry.
    pub fn insert_product(&self, product: Product) {
        self.lock().products.insert(product.id, product);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.lock().carts.get(&user_id).cloned())
    }

    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut state = self.lock();
        if let Some(cart) = state.carts.get(&user_id) {
            return Ok(cart.clone());
        }

        state.next_cart_id += 1;
        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(state.next_cart_id),
            user_id,
            created_at: now,
            updated_at: now,
        };
        state.carts.insert(user_id, cart.clone());
        Ok(cart)
    }

    async fn upsert_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        delta: Quantity,
    ) -> Result<CartItem, RepositoryError> {
        let mut state = self.lock();
        if state.cart_by_id(cart_id).is_none() || !state.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound);
        }

        let now = Utc::now();
        let position = state
            .items
            .iter()
            .position(|item| item.cart_id == cart_id && item.product_id == product_id);

        let item = if let Some(idx) = position {
            let item = &mut state.items[idx];
            item.quantity = item
                .quantity
                .checked_add(delta)
                .map_err(|e| RepositoryError::Conflict(format!("quantity overflow: {e}")))?;
            item.updated_at = now;
            item.clone()
        } else {
            state.next_item_id += 1;
            let item = CartItem {
                id: CartItemId::new(state.next_item_id),
                cart_id,
                product_id,
                quantity: delta,
                created_at: now,
                updated_at: now,
            };
            state.items.push(item.clone());
            item
        };

        state.touch(cart_id);
        Ok(item)
    }

    async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        if state.cart_by_id(cart_id).is_none() {
            return Err(RepositoryError::NotFound);
        }

        let before = state.items.len();
        state
            .items
            .retain(|item| !(item.cart_id == cart_id && item.product_id == product_id));
        let removed = state.items.len() < before;
        if removed {
            state.touch(cart_id);
        }
        Ok(removed)
    }

    async fn list_items(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let state = self.lock();
        state
            .items
            .iter()
            .filter(|item| item.cart_id == cart_id)
            .map(|item| {
                state
                    .products
                    .get(&item.product_id)
                    .map(|product| CartLine {
                        item: item.clone(),
                        product: product.clone(),
                    })
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "cart item {} references missing product {}",
                            item.id, item.product_id
                        ))
                    })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.lock().products.values().cloned().collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock().products.get(&id).cloned())
    }
}

#[async_trait]
impl SuggestionStore for MemoryStore {
    async fn store(
        &self,
        user_id: UserId,
        drafts: &[SuggestionDraft],
    ) -> Result<Vec<Suggestion>, RepositoryError> {
        let mut state = self.lock();
        let now = Utc::now();
        let mut stored = Vec::with_capacity(drafts.len());
        for draft in drafts {
            state.next_suggestion_id += 1;
            stored.push(Suggestion {
                id: SuggestionId::new(state.next_suggestion_id),
                user_id,
                title: draft.title.clone(),
                items: draft.items.clone(),
                reason: draft.reason.clone(),
                timestamp: draft.timestamp.unwrap_or(now),
            });
        }
        state.suggestions.insert(user_id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, user_id: UserId) -> Result<Vec<Suggestion>, RepositoryError> {
        Ok(self
            .lock()
            .suggestions
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        Ok(self
            .lock()
            .suggestions
            .get(&user_id)
            .is_some_and(|list| !list.is_empty()))
    }

    async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let removed = self
            .lock()
            .suggestions
            .remove(&user_id)
            .map_or(0, |list| list.len());
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cartwise_core::Price;
    use rust_decimal::Decimal;

    fn product(id: i32, name: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Price::new(Decimal::new(199, 2)).unwrap(),
            tags: String::new(),
        }
    }

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let first = store.get_or_create_cart(UserId::new(7)).await.unwrap();
        let second = store.get_or_create_cart(UserId::new(7)).await.unwrap();
        assert_eq!(first.id, second.id);

        let other = store.get_or_create_cart(UserId::new(8)).await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_upsert_accumulates_quantity() {
        let store = MemoryStore::with_products([product(1, "pasta")]);
        let cart = store.get_or_create_cart(UserId::new(7)).await.unwrap();

        store.upsert_item(cart.id, ProductId::new(1), qty(2)).await.unwrap();
        let item = store.upsert_item(cart.id, ProductId::new(1), qty(3)).await.unwrap();
        assert_eq!(item.quantity.get(), 5);

        let lines = store.list_items(cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.name, "pasta");
    }

    #[tokio::test]
    async fn test_upsert_unknown_product_is_not_found() {
        let store = MemoryStore::new();
        let cart = store.get_or_create_cart(UserId::new(7)).await.unwrap();
        let result = store.upsert_item(cart.id, ProductId::new(99), qty(1)).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_remove_item() {
        let store = MemoryStore::with_products([product(1, "pasta")]);
        let cart = store.get_or_create_cart(UserId::new(7)).await.unwrap();
        store.upsert_item(cart.id, ProductId::new(1), qty(1)).await.unwrap();

        assert!(store.remove_item(cart.id, ProductId::new(1)).await.unwrap());
        assert!(!store.remove_item(cart.id, ProductId::new(1)).await.unwrap());
        assert!(matches!(
            store.remove_item(CartId::new(404), ProductId::new(1)).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_store_replaces_previous_set() {
        let store = MemoryStore::new();
        let user = UserId::new(7);

        store
            .store(
                user,
                &[
                    SuggestionDraft::new("a", vec![], ""),
                    SuggestionDraft::new("b", vec![], ""),
                ],
            )
            .await
            .unwrap();
        store
            .store(user, &[SuggestionDraft::new("c", vec!["x".into()], "why")])
            .await
            .unwrap();

        let stored = store.get(user).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "c");
        assert_eq!(stored[0].user_id, user);
        assert!(store.exists(user).await.unwrap());

        assert_eq!(store.clear(user).await.unwrap(), 1);
        assert!(!store.exists(user).await.unwrap());
        assert!(store.get(user).await.unwrap().is_empty());
    }
}
