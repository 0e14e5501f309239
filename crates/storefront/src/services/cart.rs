//! Cart mutation service.
//!
//! Applies add/remove requests through the [`CartStore`] and decides when a
//! suggestion refresh is due. Follow-up work is only ever queued, never
//! awaited, so the response goes out as soon as the store write returns.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use cartwise_core::{ProductId, Quantity, QuantityError, UserId};

use super::background::{BackgroundJob, BackgroundQueue};
use crate::db::{CartStore, ProductCatalog, RepositoryError};
use crate::models::{CartDetail, CartItem};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The requested quantity is out of range.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The product is not in the catalog.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The user has no cart yet.
    #[error("cart not found")]
    CartNotFound,

    /// The product is not in the user's cart.
    #[error("product {0} is not in the cart")]
    ItemNotFound(ProductId),

    /// Store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of a successful add.
#[derive(Debug, Clone)]
pub struct AddOutcome {
    /// The line after the increment.
    pub item: CartItem,
    /// Distinct products now in the cart.
    pub distinct_items: usize,
    /// Whether a suggestion refresh was accepted by the queue.
    pub refresh_queued: bool,
}

/// Orchestrates cart mutations.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductCatalog>,
    queue: BackgroundQueue,
    threshold: usize,
    notify_changes: bool,
}

impl CartService {
    /// Create a cart service.
    ///
    /// A refresh is queued whenever an add leaves more than `threshold`
    /// distinct products in the cart. With `notify_changes` set, every
    /// successful mutation also queues a monitoring notification.
    #[must_use]
    pub fn new(
        carts: Arc<dyn CartStore>,
        products: Arc<dyn ProductCatalog>,
        queue: BackgroundQueue,
        threshold: usize,
        notify_changes: bool,
    ) -> Self {
        Self {
            carts,
            products,
            queue,
            threshold,
            notify_changes,
        }
    }

    /// Add `quantity` units of a product to the user's cart.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidQuantity` if `quantity < 1`
    /// - `CartError::ProductNotFound` if the product does not exist
    /// - `CartError::Repository` for store failures
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<AddOutcome, CartError> {
        let quantity = Quantity::new(quantity)?;

        if self.products.get_product(product_id).await?.is_none() {
            return Err(CartError::ProductNotFound(product_id));
        }

        let cart = self.carts.get_or_create_cart(user_id).await?;
        let item = self
            .carts
            .upsert_item(cart.id, product_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ProductNotFound(product_id),
                other => CartError::Repository(other),
            })?;

        let distinct_items = self.carts.list_items(cart.id).await?.len();

        let refresh_queued = distinct_items > self.threshold
            && self
                .queue
                .submit(BackgroundJob::RefreshSuggestions { user_id });
        if refresh_queued {
            info!(distinct_items, threshold = self.threshold, "Suggestion refresh queued");
        }

        self.queue_notification(user_id);

        Ok(AddOutcome {
            item,
            distinct_items,
            refresh_queued,
        })
    }

    /// Remove a product line from the user's cart.
    ///
    /// # Errors
    ///
    /// - `CartError::CartNotFound` if the user has no cart
    /// - `CartError::ItemNotFound` if the product is not in the cart
    /// - `CartError::Repository` for store failures
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), CartError> {
        let cart = self
            .carts
            .find_cart(user_id)
            .await?
            .ok_or(CartError::CartNotFound)?;

        let removed = match self.carts.remove_item(cart.id, product_id).await {
            Ok(removed) => removed,
            Err(RepositoryError::NotFound) => return Err(CartError::CartNotFound),
            Err(e) => return Err(e.into()),
        };
        if !removed {
            return Err(CartError::ItemNotFound(product_id));
        }

        self.queue_notification(user_id);
        Ok(())
    }

    /// The user's cart with every line and product.
    ///
    /// # Errors
    ///
    /// - `CartError::CartNotFound` if the user has no cart
    /// - `CartError::Repository` for store failures
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartDetail, CartError> {
        load_cart_detail(self.carts.as_ref(), user_id)
            .await?
            .ok_or(CartError::CartNotFound)
    }

    fn queue_notification(&self, user_id: UserId) {
        if self.notify_changes {
            self.queue
                .submit(BackgroundJob::NotifyCartChange { user_id });
        }
    }
}

/// Load a user's cart and all its lines, or `None` if there is no cart.
///
/// # Errors
///
/// Returns `RepositoryError` if either query fails.
pub async fn load_cart_detail(
    carts: &dyn CartStore,
    user_id: UserId,
) -> Result<Option<CartDetail>, RepositoryError> {
    let Some(cart) = carts.find_cart(user_id).await? else {
        return Ok(None);
    };
    let items = carts.list_items(cart.id).await?;
    Ok(Some(CartDetail { cart, items }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Product;
    use crate::services::background::JobReceiver;
    use cartwise_core::Price;
    use rust_decimal::Decimal;
    use tokio::task::JoinSet;

    fn catalog() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_products((1..=6).map(|id| Product {
            id: ProductId::new(id),
            name: format!("product-{id}"),
            price: Price::new(Decimal::new(250, 2)).unwrap(),
            tags: String::new(),
        })))
    }

    fn service(store: &Arc<MemoryStore>, notify: bool) -> (CartService, JobReceiver) {
        let (queue, receiver) = BackgroundQueue::channel(32);
        let service = CartService::new(store.clone(), store.clone(), queue, 3, notify);
        (service, receiver)
    }

    fn drain(receiver: &mut JobReceiver) -> Vec<BackgroundJob> {
        std::iter::from_fn(|| receiver.try_next()).collect()
    }

    #[tokio::test]
    async fn test_repeated_adds_accumulate_in_one_line() {
        let store = catalog();
        let (service, _rx) = service(&store, false);
        let user = UserId::new(7);

        service.add_to_cart(user, ProductId::new(1), 2).await.unwrap();
        let outcome = service.add_to_cart(user, ProductId::new(1), 3).await.unwrap();

        assert_eq!(outcome.item.quantity.get(), 5);
        assert_eq!(outcome.distinct_items, 1);

        let cart = service.get_cart(user).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[tokio::test]
    async fn test_rejects_invalid_quantity_and_unknown_product() {
        let store = catalog();
        let (service, _rx) = service(&store, false);
        let user = UserId::new(7);

        assert!(matches!(
            service.add_to_cart(user, ProductId::new(1), 0).await,
            Err(CartError::InvalidQuantity(_))
        ));
        assert!(matches!(
            service.add_to_cart(user, ProductId::new(99), 1).await,
            Err(CartError::ProductNotFound(_))
        ));
        assert!(matches!(
            service.get_cart(user).await,
            Err(CartError::CartNotFound)
        ));
    }

    #[tokio::test]
    async fn test_refresh_fires_on_every_add_above_threshold() {
        let store = catalog();
        let (service, mut rx) = service(&store, false);
        let user = UserId::new(7);

        for id in 1..=3 {
            let outcome = service.add_to_cart(user, ProductId::new(id), 1).await.unwrap();
            assert!(!outcome.refresh_queued);
        }
        assert!(drain(&mut rx).is_empty());

        let fourth = service.add_to_cart(user, ProductId::new(4), 1).await.unwrap();
        assert!(fourth.refresh_queued);
        assert_eq!(fourth.distinct_items, 4);
        assert_eq!(
            drain(&mut rx),
            [BackgroundJob::RefreshSuggestions { user_id: user }]
        );

        // Staying above the threshold queues again; there is no debouncing.
        service.add_to_cart(user, ProductId::new(1), 1).await.unwrap();
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_notifications_follow_mutations() {
        let store = catalog();
        let (service, mut rx) = service(&store, true);
        let user = UserId::new(7);

        service.add_to_cart(user, ProductId::new(1), 1).await.unwrap();
        service.remove_from_cart(user, ProductId::new(1)).await.unwrap();

        let notify = BackgroundJob::NotifyCartChange { user_id: user };
        assert_eq!(drain(&mut rx), [notify, notify]);
    }

    #[tokio::test]
    async fn test_remove_errors() {
        let store = catalog();
        let (service, _rx) = service(&store, false);
        let user = UserId::new(7);

        assert!(matches!(
            service.remove_from_cart(user, ProductId::new(1)).await,
            Err(CartError::CartNotFound)
        ));

        service.add_to_cart(user, ProductId::new(1), 4).await.unwrap();
        assert!(matches!(
            service.remove_from_cart(user, ProductId::new(2)).await,
            Err(CartError::ItemNotFound(_))
        ));

        service.remove_from_cart(user, ProductId::new(1)).await.unwrap();
        let cart = service.get_cart(user).await.unwrap();
        assert!(cart.items.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_of_one_product_share_a_line() {
        let store = catalog();
        let (service, _rx) = service(&store, false);
        let user = UserId::new(7);

        let mut adds = JoinSet::new();
        for quantity in 1..=10 {
            let service = service.clone();
            adds.spawn(async move {
                service
                    .add_to_cart(user, ProductId::new(1), quantity)
                    .await
            });
        }
        while let Some(outcome) = adds.join_next().await {
            outcome.unwrap().unwrap();
        }

        let cart = service.get_cart(user).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_quantity(), 55);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_adds_create_one_cart() {
        let store = catalog();
        let (service, _rx) = service(&store, false);
        let user = UserId::new(7);

        let mut adds = JoinSet::new();
        for id in 1..=6 {
            let service = service.clone();
            adds.spawn(async move { service.add_to_cart(user, ProductId::new(id), 1).await });
        }
        let mut cart_ids = Vec::new();
        while let Some(outcome) = adds.join_next().await {
            cart_ids.push(outcome.unwrap().unwrap().item.cart_id);
        }

        let cart = service.get_cart(user).await.unwrap();
        assert_eq!(cart.items.len(), 6);
        assert!(cart_ids.iter().all(|id| *id == cart.cart.id));
    }
}
