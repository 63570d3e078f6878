use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    Cart, Money, Order, OrderDraft, OrderId, PaymentStatus, Product, ProductId, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Page, PageRequest, Result, StoreError,
    store::{CartStore, InventoryStore, OrderRepository, Placement, StatusTransition},
};

type Slot<T> = Arc<Mutex<T>>;

fn slot<T>(value: T) -> Slot<T> {
    Arc::new(Mutex::new(value))
}

#[derive(Default)]
struct Tables {
    products: RwLock<HashMap<ProductId, Slot<Product>>>,
    carts: RwLock<HashMap<UserId, Slot<Cart>>>,
    orders: RwLock<HashMap<OrderId, Slot<Order>>>,
    /// Order IDs in creation order.
    order_log: RwLock<Vec<OrderId>>,
    idempotency_keys: Mutex<HashMap<(UserId, String), OrderId>>,
    customers: RwLock<HashSet<UserId>>,
}

/// In-memory store.
///
/// Every product, cart and order lives behind its own mutex, so two
/// operations only contend when they touch the same record. Lock order is
/// cart or order first, then products in ascending id order, then the table
/// maps. Table map locks are never held while waiting on a record lock.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Tables>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn product_slot(&self, id: ProductId) -> Option<Slot<Product>> {
        self.tables.products.read().await.get(&id).cloned()
    }

    async fn order_slot(&self, id: OrderId) -> Option<Slot<Order>> {
        self.tables.orders.read().await.get(&id).cloned()
    }

    async fn existing_cart_slot(&self, customer_id: UserId) -> Option<Slot<Cart>> {
        self.tables.carts.read().await.get(&customer_id).cloned()
    }

    /// Returns the customer's cart slot, creating the cart on first use.
    async fn cart_slot(&self, customer_id: UserId) -> Slot<Cart> {
        if let Some(existing) = self.existing_cart_slot(customer_id).await {
            return existing;
        }
        self.tables
            .carts
            .write()
            .await
            .entry(customer_id)
            .or_insert_with(|| slot(Cart::new(customer_id)))
            .clone()
    }

    /// Locks the given products in the order supplied. Callers pass ids in
    /// ascending order.
    async fn lock_products(
        &self,
        ids: impl IntoIterator<Item = ProductId>,
    ) -> Result<Vec<OwnedMutexGuard<Product>>> {
        let slots = {
            let products = self.tables.products.read().await;
            ids.into_iter()
                .map(|id| {
                    products
                        .get(&id)
                        .cloned()
                        .ok_or(StoreError::ProductNotFound(id))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let mut guards = Vec::with_capacity(slots.len());
        for product in slots {
            guards.push(product.lock_owned().await);
        }
        Ok(guards)
    }

    async fn snapshot_orders(&self, ids: impl IntoIterator<Item = OrderId>) -> Vec<Order> {
        let slots: Vec<_> = {
            let orders = self.tables.orders.read().await;
            ids.into_iter()
                .filter_map(|id| orders.get(&id).cloned())
                .collect()
        };

        let mut snapshot = Vec::with_capacity(slots.len());
        for order in slots {
            snapshot.push(order.lock().await.clone());
        }
        snapshot
    }

    /// Returns every order, newest first.
    async fn all_orders_newest_first(&self) -> Vec<Order> {
        let ids: Vec<OrderId> = self
            .tables
            .order_log
            .read()
            .await
            .iter()
            .rev()
            .copied()
            .collect();
        self.snapshot_orders(ids).await
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        match self.product_slot(id).await {
            Some(product) => Ok(Some(product.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn upsert_product(&self, product: Product) -> Result<Product> {
        let existing = {
            let mut products = self.tables.products.write().await;
            match products.entry(product.id) {
                Entry::Vacant(entry) => {
                    entry.insert(slot(product.clone()));
                    return Ok(product);
                }
                Entry::Occupied(entry) => entry.get().clone(),
            }
        };

        let mut stored = existing.lock().await;
        stored.name = product.name;
        stored.images = product.images;
        stored.price = product.price;
        stored.is_active = product.is_active;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<Product> {
        let product = self
            .product_slot(id)
            .await
            .ok_or(StoreError::ProductNotFound(id))?;
        let mut stored = product.lock().await;
        stored.is_active = false;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn conditional_decrement_stock(&self, id: ProductId, quantity: u32) -> Result<u32> {
        let product = self
            .product_slot(id)
            .await
            .ok_or(StoreError::ProductNotFound(id))?;
        let mut stored = product.lock().await;
        if stored.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: id,
                name: stored.name.clone(),
                requested: quantity,
                available: stored.stock,
            });
        }
        stored.stock -= quantity;
        stored.updated_at = Utc::now();
        Ok(stored.stock)
    }

    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<u32> {
        let product = self
            .product_slot(id)
            .await
            .ok_or(StoreError::ProductNotFound(id))?;
        let mut stored = product.lock().await;
        stored.stock = stored
            .stock
            .checked_add(quantity)
            .ok_or(StoreError::StockOverflow(id))?;
        stored.updated_at = Utc::now();
        Ok(stored.stock)
    }

    async fn product_count(&self) -> Result<u64> {
        Ok(self.tables.products.read().await.len() as u64)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_cart(&self, customer_id: UserId) -> Result<Cart> {
        match self.existing_cart_slot(customer_id).await {
            Some(cart) => Ok(cart.lock().await.clone()),
            None => Ok(Cart::new(customer_id)),
        }
    }

    async fn add_cart_item(
        &self,
        customer_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        if self.product_slot(product_id).await.is_none() {
            return Err(StoreError::ProductNotFound(product_id));
        }
        let cart = self.cart_slot(customer_id).await;
        let mut cart = cart.lock().await;
        cart.add(product_id, quantity);
        Ok(cart.clone())
    }

    async fn remove_cart_item(&self, customer_id: UserId, product_id: ProductId) -> Result<Cart> {
        let Some(cart) = self.existing_cart_slot(customer_id).await else {
            return Ok(Cart::new(customer_id));
        };
        let mut cart = cart.lock().await;
        cart.remove(product_id);
        Ok(cart.clone())
    }

    async fn set_cart_item_quantity(
        &self,
        customer_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let cart = self
            .existing_cart_slot(customer_id)
            .await
            .ok_or(StoreError::CartItemNotFound { product_id })?;
        let mut cart = cart.lock().await;
        if !cart.set_quantity(product_id, quantity) {
            return Err(StoreError::CartItemNotFound { product_id });
        }
        Ok(cart.clone())
    }

    async fn register_customer(&self, customer_id: UserId) -> Result<()> {
        self.tables.customers.write().await.insert(customer_id);
        Ok(())
    }

    async fn customer_count(&self) -> Result<u64> {
        Ok(self.tables.customers.read().await.len() as u64)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create_order_atomic(
        &self,
        mut draft: OrderDraft,
        expected_cart_version: u64,
    ) -> Result<Placement> {
        let customer_id = draft.customer_id;
        let cart = self.cart_slot(customer_id).await;
        // Holding the cart lock serializes placements for this customer,
        // which also makes the idempotency check-then-insert atomic.
        let mut cart = cart.lock().await;

        if let Some(key) = &draft.idempotency_key {
            let existing = self
                .tables
                .idempotency_keys
                .lock()
                .await
                .get(&(customer_id, key.clone()))
                .copied();
            if let Some(order_id) = existing {
                let order = self
                    .order_slot(order_id)
                    .await
                    .ok_or(StoreError::OrderNotFound(order_id))?;
                let order = order.lock().await.clone();
                return Ok(Placement::Replayed(order));
            }
        }

        if cart.version != expected_cart_version {
            return Err(StoreError::CartVersionConflict {
                customer_id,
                expected: expected_cart_version,
                actual: cart.version,
            });
        }

        let requirements = draft.stock_requirements();
        let mut products = self
            .lock_products(requirements.keys().copied())
            .await
            .map_err(|e| match e {
                StoreError::ProductNotFound(id) => StoreError::ProductUnavailable(id),
                other => other,
            })?;

        for (product, (&product_id, &requested)) in products.iter().zip(&requirements) {
            if !product.is_active {
                return Err(StoreError::ProductUnavailable(product_id));
            }
            if product.stock < requested {
                return Err(StoreError::InsufficientStock {
                    product_id,
                    name: product.name.clone(),
                    requested,
                    available: product.stock,
                });
            }
        }

        // Every lock the commit needs is taken before the first write, so a
        // dropped future can never leave a partial placement behind.
        let mut orders = self.tables.orders.write().await;
        let mut order_log = self.tables.order_log.write().await;
        let mut idempotency_keys = self.tables.idempotency_keys.lock().await;

        let now = Utc::now();
        for (product, requested) in products.iter_mut().zip(requirements.values()) {
            draft.recapture(product);
            product.stock -= requested;
            product.updated_at = now;
        }

        let order = Order::place(OrderId::new(), draft, now);
        orders.insert(order.id, slot(order.clone()));
        order_log.push(order.id);
        if let Some(key) = &order.idempotency_key {
            idempotency_keys.insert((customer_id, key.clone()), order.id);
        }
        cart.clear();

        tracing::debug!(order_id = %order.id, lines = order.lines.len(), "order committed");
        Ok(Placement::Created(order))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        match self.order_slot(id).await {
            Some(order) => Ok(Some(order.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn find_order_by_idempotency_key(
        &self,
        customer_id: UserId,
        key: &str,
    ) -> Result<Option<Order>> {
        let existing = self
            .tables
            .idempotency_keys
            .lock()
            .await
            .get(&(customer_id, key.to_string()))
            .copied();
        match existing {
            Some(id) => self.get_order(id).await,
            None => Ok(None),
        }
    }

    async fn list_orders_for_customer(
        &self,
        customer_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        let mine: Vec<Order> = self
            .all_orders_newest_first()
            .await
            .into_iter()
            .filter(|o| o.customer_id == customer_id)
            .collect();
        let total = mine.len() as u64;
        let items = mine
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();

        Ok(Page {
            items,
            total,
            request: page,
        })
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.all_orders_newest_first().await)
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        transition: StatusTransition,
    ) -> Result<Order> {
        let order = self
            .order_slot(id)
            .await
            .ok_or(StoreError::OrderNotFound(id))?;
        let mut order = order.lock().await;

        if order.status != transition.expected {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected: transition.expected,
                actual: order.status,
            });
        }

        let now = Utc::now();
        if transition.restore_inventory {
            let requirements = order.stock_requirements();
            let mut products = self.lock_products(requirements.keys().copied()).await?;

            let restored = products
                .iter()
                .zip(&requirements)
                .map(|(product, (&product_id, &quantity))| {
                    product
                        .stock
                        .checked_add(quantity)
                        .ok_or(StoreError::StockOverflow(product_id))
                })
                .collect::<Result<Vec<u32>>>()?;

            for (product, stock) in products.iter_mut().zip(restored) {
                product.stock = stock;
                product.updated_at = now;
            }
        }

        order.status = transition.target;
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn set_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order> {
        let order = self
            .order_slot(id)
            .await
            .ok_or(StoreError::OrderNotFound(id))?;
        let mut order = order.lock().await;
        order.apply_payment_status(status, Utc::now());
        Ok(order.clone())
    }

    async fn order_count(&self) -> Result<u64> {
        Ok(self.tables.order_log.read().await.len() as u64)
    }

    async fn paid_revenue(&self) -> Result<Money> {
        Ok(self
            .all_orders_newest_first()
            .await
            .iter()
            .filter(|o| o.payment_status == PaymentStatus::Paid)
            .map(|o| o.total_price)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreExt;
    use common::{OrderLineSnapshot, OrderStatus, PaymentMethod, ShippingAddress};

    async fn seed(store: &InMemoryStore, name: &str, price: i64, stock: u32) -> Product {
        store
            .upsert_product(Product::new(name, Money::from_cents(price), stock))
            .await
            .unwrap()
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Grace Hopper".into(),
            phone: "555-0101".into(),
            address: "1 Harbor Rd".into(),
            city: "Arlington".into(),
            postal_code: "22201".into(),
            country: "US".into(),
        }
    }

    /// Fills the cart and returns a draft matching it plus the cart version.
    async fn cart_and_draft(
        store: &InMemoryStore,
        customer_id: UserId,
        items: &[(&Product, u32)],
        key: Option<&str>,
    ) -> (OrderDraft, u64) {
        let mut version = store.get_cart(customer_id).await.unwrap().version;
        for (product, quantity) in items {
            version = store
                .add_cart_item(customer_id, product.id, *quantity)
                .await
                .unwrap()
                .version;
        }
        let draft = OrderDraft {
            customer_id,
            lines: items
                .iter()
                .map(|(p, q)| OrderLineSnapshot::capture(p, *q))
                .collect(),
            shipping_address: address(),
            payment_method: PaymentMethod::CashOnDelivery,
            idempotency_key: key.map(str::to_string),
        };
        (draft, version)
    }

    #[tokio::test]
    async fn placement_snapshots_catalog_state_at_commit() {
        let store = InMemoryStore::new();
        let customer = UserId::new();
        let mut kettle = seed(&store, "Kettle", 3_000, 4).await;
        let (draft, version) = cart_and_draft(&store, customer, &[(&kettle, 2)], None).await;

        kettle.name = "Kettle (steel)".into();
        kettle.price = Money::from_cents(3_500);
        store.upsert_product(kettle.clone()).await.unwrap();

        let order = store
            .create_order_atomic(draft, version)
            .await
            .unwrap()
            .into_order();

        assert_eq!(order.lines[0].name, "Kettle (steel)");
        assert_eq!(order.lines[0].unit_price, Money::from_cents(3_500));
        assert_eq!(order.lines[0].quantity, 2);
        assert_eq!(order.total_price, Money::from_cents(7_000));
    }

    #[tokio::test]
    async fn conditional_decrement_refuses_to_go_negative() {
        let store = InMemoryStore::new();
        let product = seed(&store, "Mug", 800, 3).await;

        assert_eq!(store.conditional_decrement_stock(product.id, 2).await.unwrap(), 1);
        let err = store
            .conditional_decrement_stock(product.id, 2)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(store.stock_of(product.id).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn upsert_keeps_stock_of_existing_product() {
        let store = InMemoryStore::new();
        let mut product = seed(&store, "Mug", 800, 3).await;

        product.price = Money::from_cents(900);
        product.stock = 999;
        let stored = store.upsert_product(product).await.unwrap();

        assert_eq!(stored.price.cents(), 900);
        assert_eq!(stored.stock, 3);
    }

    #[tokio::test]
    async fn placement_commits_stock_order_and_cart_together() {
        let store = InMemoryStore::new();
        let a = seed(&store, "A", 1000, 5).await;
        let b = seed(&store, "B", 250, 1).await;
        let customer = UserId::new();
        let (draft, version) = cart_and_draft(&store, customer, &[(&a, 2), (&b, 1)], None).await;

        let placement = store.create_order_atomic(draft, version).await.unwrap();

        assert!(!placement.is_replay());
        assert_eq!(placement.order().total_price.cents(), 2250);
        assert_eq!(store.stock_of(a.id).await.unwrap(), Some(3));
        assert_eq!(store.stock_of(b.id).await.unwrap(), Some(0));
        assert!(store.get_cart(customer).await.unwrap().is_empty());
        assert_eq!(store.order_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_placement_leaves_nothing_behind() {
        let store = InMemoryStore::new();
        let a = seed(&store, "A", 1000, 5).await;
        let b = seed(&store, "B", 250, 0).await;
        let customer = UserId::new();
        let (draft, version) = cart_and_draft(&store, customer, &[(&a, 2), (&b, 1)], None).await;

        let err = store.create_order_atomic(draft, version).await.unwrap_err();

        assert!(matches!(err, StoreError::InsufficientStock { product_id, .. } if product_id == b.id));
        assert_eq!(store.stock_of(a.id).await.unwrap(), Some(5));
        assert_eq!(store.get_cart(customer).await.unwrap().items.len(), 2);
        assert_eq!(store.order_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn inactive_product_blocks_placement() {
        let store = InMemoryStore::new();
        let a = seed(&store, "A", 1000, 5).await;
        let customer = UserId::new();
        let (draft, version) = cart_and_draft(&store, customer, &[(&a, 1)], None).await;
        store.deactivate_product(a.id).await.unwrap();

        let err = store.create_order_atomic(draft, version).await.unwrap_err();

        assert!(matches!(err, StoreError::ProductUnavailable(id) if id == a.id));
        assert_eq!(store.stock_of(a.id).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn stale_cart_version_is_rejected() {
        let store = InMemoryStore::new();
        let a = seed(&store, "A", 1000, 5).await;
        let customer = UserId::new();
        let (draft, version) = cart_and_draft(&store, customer, &[(&a, 1)], None).await;
        store.add_cart_item(customer, a.id, 1).await.unwrap();

        let err = store.create_order_atomic(draft, version).await.unwrap_err();

        assert!(matches!(err, StoreError::CartVersionConflict { .. }));
        assert_eq!(store.stock_of(a.id).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn idempotency_key_replays_existing_order() {
        let store = InMemoryStore::new();
        let a = seed(&store, "A", 1000, 5).await;
        let customer = UserId::new();
        let (draft, version) = cart_and_draft(&store, customer, &[(&a, 2)], Some("req-1")).await;

        let first = store
            .create_order_atomic(draft.clone(), version)
            .await
            .unwrap();
        let second = store.create_order_atomic(draft, version).await.unwrap();

        assert!(second.is_replay());
        assert_eq!(first.order().id, second.order().id);
        assert_eq!(store.stock_of(a.id).await.unwrap(), Some(3));
        assert_eq!(store.order_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cancellation_restores_once() {
        let store = InMemoryStore::new();
        let a = seed(&store, "A", 1000, 5).await;
        let customer = UserId::new();
        let (draft, version) = cart_and_draft(&store, customer, &[(&a, 2)], None).await;
        let order = store
            .create_order_atomic(draft, version)
            .await
            .unwrap()
            .into_order();
        store.deactivate_product(a.id).await.unwrap();

        let cancelled = store
            .transition_order_status(order.id, StatusTransition::cancel(OrderStatus::Processing))
            .await
            .unwrap();
        let again = store
            .transition_order_status(order.id, StatusTransition::cancel(OrderStatus::Processing))
            .await
            .unwrap_err();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(matches!(
            again,
            StoreError::StatusConflict {
                actual: OrderStatus::Cancelled,
                ..
            }
        ));
        assert_eq!(store.stock_of(a.id).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn payment_status_paid_sets_paid_at() {
        let store = InMemoryStore::new();
        let a = seed(&store, "A", 1000, 5).await;
        let customer = UserId::new();
        let (draft, version) = cart_and_draft(&store, customer, &[(&a, 1)], None).await;
        let order = store
            .create_order_atomic(draft, version)
            .await
            .unwrap()
            .into_order();

        let paid = store
            .set_payment_status(order.id, PaymentStatus::Paid)
            .await
            .unwrap();

        assert!(paid.paid_at.is_some());
        assert_eq!(store.paid_revenue().await.unwrap().cents(), 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decrements_never_oversell() {
        let store = InMemoryStore::new();
        let product = seed(&store, "Hot item", 100, 10).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.conditional_decrement_stock(product.id, 1).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(store.stock_of(product.id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn customer_orders_are_paged_newest_first() {
        let store = InMemoryStore::new();
        let a = seed(&store, "A", 100, 50).await;
        let customer = UserId::new();

        let mut placed = Vec::new();
        for _ in 0..7 {
            let (draft, version) = cart_and_draft(&store, customer, &[(&a, 1)], None).await;
            placed.push(
                store
                    .create_order_atomic(draft, version)
                    .await
                    .unwrap()
                    .into_order()
                    .id,
            );
        }

        let first = store
            .list_orders_for_customer(customer, PageRequest::new(Some(1), Some(5)))
            .await
            .unwrap();
        let second = store
            .list_orders_for_customer(customer, PageRequest::new(Some(2), Some(5)))
            .await
            .unwrap();

        assert_eq!(first.total, 7);
        assert_eq!(first.pages(), 2);
        assert_eq!(first.items[0].id, placed[6]);
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.items[1].id, placed[0]);
    }
}
