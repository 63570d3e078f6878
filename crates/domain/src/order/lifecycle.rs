//! Order lifecycle manager: placement, status changes and payment tracking.

use std::time::Instant;

use common::{
    Order, OrderDraft, OrderId, OrderLineSnapshot, OrderStatus, PaymentStatus, Principal,
};
use store::{Page, PageRequest, Placement, StatusTransition, Store, StoreError};

use super::{CancelOrder, OrderError, PlaceOrder, UpdateOrderStatus, UpdatePaymentStatus};
use crate::error::DomainError;

/// Placement re-reads the cart and retries this many times when the cart
/// changes between validation and commit.
const MAX_PLACEMENT_ATTEMPTS: u32 = 3;

/// Status changes retry this many times when another writer got there first.
const MAX_TRANSITION_ATTEMPTS: u32 = 3;

/// Orchestrates cart-to-order conversion and every later change to an order.
///
/// All multi-record effects go through the store's atomic commands, so the
/// manager only ever holds transient copies of orders.
#[derive(Clone)]
pub struct OrderLifecycleManager<S: Store> {
    store: S,
}

impl<S: Store> OrderLifecycleManager<S> {
    /// Creates a new manager over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places the caller's cart as an order.
    ///
    /// Validates every cart line in insertion order, then commits stock
    /// decrements, the order and the cart clearing as one unit.
    #[tracing::instrument(skip(self, principal, cmd), fields(customer_id = %principal.id))]
    pub async fn place_order(
        &self,
        principal: &Principal,
        cmd: PlaceOrder,
    ) -> Result<Placement, DomainError> {
        let started = Instant::now();
        let result = self.try_place(principal, cmd).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(Placement::Created(order)) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(order_id = %order.id, total = %order.total_price, "order placed");
            }
            Ok(Placement::Replayed(order)) => {
                tracing::info!(order_id = %order.id, "placement replayed for idempotency key");
            }
            Err(e) => {
                metrics::counter!("order_placement_failures_total", "reason" => failure_reason(e))
                    .increment(1);
                tracing::warn!(error = %e, "order placement rejected");
            }
        }

        result
    }

    async fn try_place(
        &self,
        principal: &Principal,
        cmd: PlaceOrder,
    ) -> Result<Placement, DomainError> {
        if let Some(field) = cmd.shipping_address.missing_field() {
            return Err(OrderError::InvalidShippingAddress { field }.into());
        }

        // A retry after a successful placement finds an empty cart; answer
        // with the order the key already produced.
        if let Some(key) = &cmd.idempotency_key {
            if let Some(order) = self
                .store
                .find_order_by_idempotency_key(principal.id, key)
                .await?
            {
                return Ok(Placement::Replayed(order));
            }
        }

        for attempt in 1..=MAX_PLACEMENT_ATTEMPTS {
            let cart = self.store.get_cart(principal.id).await?;
            if cart.is_empty() {
                return Err(OrderError::EmptyCart.into());
            }

            let mut lines = Vec::with_capacity(cart.items.len());
            for item in &cart.items {
                let product = self
                    .store
                    .get_product(item.product_id)
                    .await?
                    .filter(|p| p.is_active)
                    .ok_or(OrderError::ProductUnavailable(item.product_id))?;

                if !product.can_fulfil(item.quantity) {
                    return Err(OrderError::InsufficientStock {
                        product_id: product.id,
                        name: product.name.clone(),
                        requested: item.quantity,
                        available: product.stock,
                    }
                    .into());
                }
                lines.push(OrderLineSnapshot::capture(&product, item.quantity));
            }

            let draft = OrderDraft {
                customer_id: principal.id,
                lines,
                shipping_address: cmd.shipping_address.clone(),
                payment_method: cmd.payment_method,
                idempotency_key: cmd.idempotency_key.clone(),
            };

            match self.store.create_order_atomic(draft, cart.version).await {
                Ok(placement) => return Ok(placement),
                Err(StoreError::CartVersionConflict { .. }) => {
                    tracing::debug!(attempt, "cart changed during placement, retrying");
                }
                Err(e) => return Err(placement_error(e)),
            }
        }

        Err(OrderError::ConcurrentModification(format!(
            "cart of {} kept changing during placement",
            principal.id
        ))
        .into())
    }

    /// Loads an order visible to the principal.
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn get_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        let order = self.load(order_id).await?;
        if !principal.can_access(order.customer_id) {
            return Err(DomainError::not_authorized("view this order"));
        }
        Ok(order)
    }

    /// Lists the principal's own orders, newest first.
    #[tracing::instrument(skip(self, principal), fields(customer_id = %principal.id))]
    pub async fn list_my_orders(
        &self,
        principal: &Principal,
        page: PageRequest,
    ) -> Result<Page<Order>, DomainError> {
        Ok(self
            .store
            .list_orders_for_customer(principal.id, page)
            .await?)
    }

    /// Lists every order, newest first. Admin only.
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn list_all_orders(&self, principal: &Principal) -> Result<Vec<Order>, DomainError> {
        ensure_admin(principal, "list all orders")?;
        Ok(self.store.list_all_orders().await?)
    }

    /// Overwrites an order's status. Admin only.
    ///
    /// Any move between non-cancelled statuses is allowed. Moving to
    /// `Cancelled` restores stock exactly like [`Self::cancel`], and a
    /// cancelled order can never leave `Cancelled`.
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn update_status(
        &self,
        principal: &Principal,
        cmd: UpdateOrderStatus,
    ) -> Result<Order, DomainError> {
        ensure_admin(principal, "update order status")?;
        let target: OrderStatus = cmd
            .status
            .parse()
            .map_err(|_| OrderError::InvalidStatus(cmd.status.clone()))?;

        let order = self.load(cmd.order_id).await?;
        let updated = self
            .apply_transition(order.id, order.status, |order_id, current| {
                if target == OrderStatus::Cancelled {
                    cancellation(order_id, current)
                } else if current == OrderStatus::Cancelled {
                    Err(OrderError::AlreadyCancelled(order_id))
                } else {
                    Ok(StatusTransition::overwrite(current, target))
                }
            })
            .await?;

        if target == OrderStatus::Cancelled {
            record_cancellation(&updated);
        } else {
            tracing::info!(order_id = %updated.id, status = %updated.status, "order status updated");
        }
        Ok(updated)
    }

    /// Cancels an order and restores its stock. Owner or admin.
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn cancel(
        &self,
        principal: &Principal,
        cmd: CancelOrder,
    ) -> Result<Order, DomainError> {
        let order = self.load(cmd.order_id).await?;
        if !principal.can_access(order.customer_id) {
            return Err(DomainError::not_authorized("cancel this order"));
        }

        let cancelled = self
            .apply_transition(order.id, order.status, cancellation)
            .await?;
        record_cancellation(&cancelled);
        Ok(cancelled)
    }

    /// Sets an order's payment status. Admin only.
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn update_payment_status(
        &self,
        principal: &Principal,
        cmd: UpdatePaymentStatus,
    ) -> Result<Order, DomainError> {
        ensure_admin(principal, "update payment status")?;
        let status: PaymentStatus = cmd
            .status
            .parse()
            .map_err(|_| OrderError::InvalidPaymentStatus(cmd.status.clone()))?;

        let order = self
            .store
            .set_payment_status(cmd.order_id, status)
            .await
            .map_err(|e| match e {
                StoreError::OrderNotFound(id) => OrderError::OrderNotFound(id).into(),
                other => DomainError::Store(other),
            })?;

        tracing::info!(order_id = %order.id, payment_status = %order.payment_status, "payment status updated");
        Ok(order)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id).into())
    }

    /// Runs a status compare-and-set, re-deciding against the stored status
    /// whenever a concurrent writer changed it first.
    async fn apply_transition<F>(
        &self,
        order_id: OrderId,
        observed: OrderStatus,
        decide: F,
    ) -> Result<Order, DomainError>
    where
        F: Fn(OrderId, OrderStatus) -> Result<StatusTransition, OrderError>,
    {
        let mut current = observed;
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let transition = decide(order_id, current)?;
            match self
                .store
                .transition_order_status(order_id, transition)
                .await
            {
                Ok(order) => return Ok(order),
                Err(StoreError::StatusConflict { actual, .. }) => {
                    tracing::debug!(%order_id, %actual, "order status changed concurrently");
                    current = actual;
                }
                Err(StoreError::OrderNotFound(id)) => {
                    return Err(OrderError::OrderNotFound(id).into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(OrderError::ConcurrentModification(format!(
            "status of order {order_id} kept changing"
        ))
        .into())
    }
}

fn ensure_admin(principal: &Principal, action: &'static str) -> Result<(), DomainError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(DomainError::not_authorized(action))
    }
}

fn cancellation(order_id: OrderId, current: OrderStatus) -> Result<StatusTransition, OrderError> {
    match current {
        OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled(order_id)),
        status if !status.can_cancel() => Err(OrderError::NotCancellable { order_id, status }),
        status => Ok(StatusTransition::cancel(status)),
    }
}

fn record_cancellation(order: &Order) {
    let restored: u64 = order.lines.iter().map(|l| u64::from(l.quantity)).sum();
    metrics::counter!("orders_cancelled_total").increment(1);
    metrics::counter!("stock_restored_units_total").increment(restored);
    tracing::info!(order_id = %order.id, restored, "order cancelled and stock restored");
}

fn placement_error(e: StoreError) -> DomainError {
    match e {
        StoreError::ProductUnavailable(id) | StoreError::ProductNotFound(id) => {
            OrderError::ProductUnavailable(id).into()
        }
        StoreError::InsufficientStock {
            product_id,
            name,
            requested,
            available,
        } => OrderError::InsufficientStock {
            product_id,
            name,
            requested,
            available,
        }
        .into(),
        other => DomainError::Store(other),
    }
}

fn failure_reason(e: &DomainError) -> &'static str {
    match e {
        DomainError::Order(OrderError::EmptyCart) => "empty_cart",
        DomainError::Order(OrderError::ProductUnavailable(_)) => "product_unavailable",
        DomainError::Order(OrderError::InsufficientStock { .. }) => "insufficient_stock",
        DomainError::Order(OrderError::InvalidShippingAddress { .. }) => "invalid_shipping_address",
        DomainError::Order(OrderError::ConcurrentModification(_)) => "concurrent_modification",
        DomainError::Order(_) | DomainError::Cart(_) | DomainError::NotAuthorized { .. } => {
            "rejected"
        }
        DomainError::Store(_) => "store",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, PaymentMethod, Product, ShippingAddress, UserId};
    use store::{CartStore, InMemoryStore, InventoryStore, StoreExt};

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Katherine Johnson".into(),
            phone: "555-0142".into(),
            address: "7 Langley Way".into(),
            city: "Hampton".into(),
            postal_code: "23666".into(),
            country: "US".into(),
        }
    }

    async fn setup(stock: u32) -> (OrderLifecycleManager<InMemoryStore>, Principal, Product) {
        let store = InMemoryStore::new();
        let product = store
            .upsert_product(Product::new("Globe", Money::from_cents(2_000), stock))
            .await
            .unwrap();
        (
            OrderLifecycleManager::new(store),
            Principal::customer(UserId::new()),
            product,
        )
    }

    #[tokio::test]
    async fn test_place_order_rejects_blank_address() {
        let (manager, principal, product) = setup(5).await;
        manager
            .store()
            .add_cart_item(principal.id, product.id, 1)
            .await
            .unwrap();

        let mut shipping = address();
        shipping.city = "  ".into();
        let err = manager
            .place_order(&principal, PlaceOrder::new(shipping, PaymentMethod::Online))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidShippingAddress { field: "city" })
        ));
        assert_eq!(manager.store().stock_of(product.id).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_idempotent_retry_after_success_returns_first_order() {
        let (manager, principal, product) = setup(5).await;
        manager
            .store()
            .add_cart_item(principal.id, product.id, 2)
            .await
            .unwrap();

        let cmd = PlaceOrder::new(address(), PaymentMethod::CashOnDelivery)
            .with_idempotency_key("retry-me");
        let first = manager.place_order(&principal, cmd.clone()).await.unwrap();
        let again = manager.place_order(&principal, cmd).await.unwrap();

        assert!(again.is_replay());
        assert_eq!(first.order().id, again.order().id);
        assert_eq!(manager.store().stock_of(product.id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_status_values_are_validated() {
        let (manager, _, _) = setup(1).await;
        let admin = Principal::admin(UserId::new());

        let err = manager
            .update_status(&admin, UpdateOrderStatus::new(OrderId::new(), "Lost"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Order error: Invalid order status: Lost"
        );

        let err = manager
            .update_payment_status(&admin, UpdatePaymentStatus::new(OrderId::new(), "Refunded"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidPaymentStatus(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_only_operations_reject_customers() {
        let (manager, principal, _) = setup(1).await;

        let err = manager.list_all_orders(&principal).await.unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized { .. }));

        let err = manager
            .update_status(&principal, UpdateOrderStatus::new(OrderId::new(), "Shipped"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized { .. }));
    }
}
