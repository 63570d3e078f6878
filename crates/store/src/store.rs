use async_trait::async_trait;
use common::{
    Cart, Money, Order, OrderDraft, OrderId, OrderStatus, PaymentStatus, Product, ProductId,
    UserId,
};

use crate::{DashboardStats, Page, PageRequest, Result};

/// Stock counters plus the narrow slice of the catalog the order core reads.
///
/// Every stock mutation is a single indivisible step against the backing
/// store. Stock can never be set directly, only decremented conditionally or
/// incremented.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Loads a product, active or not.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Inserts a product, or updates the catalog fields of an existing one.
    ///
    /// For an existing product the stored stock is kept: catalog edits cannot
    /// race with placements over the counter. Returns the stored record.
    async fn upsert_product(&self, product: Product) -> Result<Product>;

    /// Marks a product inactive. Its stock counter survives so cancellations
    /// can still restore into it.
    async fn deactivate_product(&self, id: ProductId) -> Result<Product>;

    /// Decrements stock by `quantity` only if at least that much is present.
    ///
    /// Returns the remaining stock, or `InsufficientStock` without changing
    /// anything.
    async fn conditional_decrement_stock(&self, id: ProductId, quantity: u32) -> Result<u32>;

    /// Increments stock unconditionally. Returns the new stock.
    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<u32>;

    /// Number of products in the catalog.
    async fn product_count(&self) -> Result<u64>;
}

/// Per-customer carts and the customer registry they hang off.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the customer's cart, empty if they never had one.
    async fn get_cart(&self, customer_id: UserId) -> Result<Cart>;

    /// Adds a product to the cart, merging with an existing line.
    ///
    /// Fails with `ProductNotFound` if the product does not exist.
    async fn add_cart_item(
        &self,
        customer_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart>;

    /// Removes a product from the cart. Absent products are not an error.
    async fn remove_cart_item(&self, customer_id: UserId, product_id: ProductId) -> Result<Cart>;

    /// Overwrites the quantity of a product already in the cart.
    ///
    /// Fails with `CartItemNotFound` if the product is not in the cart.
    async fn set_cart_item_quantity(
        &self,
        customer_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart>;

    /// Records that a customer exists. Idempotent.
    async fn register_customer(&self, customer_id: UserId) -> Result<()>;

    /// Number of registered customers.
    async fn customer_count(&self) -> Result<u64>;
}

/// Outcome of an atomic placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A new order was created and stock was committed.
    Created(Order),
    /// An order with the same idempotency key already existed; nothing changed.
    Replayed(Order),
}

impl Placement {
    pub fn order(&self) -> &Order {
        match self {
            Placement::Created(order) | Placement::Replayed(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Placement::Created(order) | Placement::Replayed(order) => order,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Placement::Replayed(_))
    }
}

/// A compare-and-set on an order's fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    /// Status the caller observed. The transition fails with `StatusConflict`
    /// if the stored status differs.
    pub expected: OrderStatus,
    /// Status to write.
    pub target: OrderStatus,
    /// Add every line's quantity back to its product's stock in the same
    /// atomic unit.
    pub restore_inventory: bool,
}

impl StatusTransition {
    /// Plain status overwrite with no inventory effect.
    pub fn overwrite(expected: OrderStatus, target: OrderStatus) -> Self {
        Self {
            expected,
            target,
            restore_inventory: false,
        }
    }

    /// Cancellation: status becomes `Cancelled` and stock is restored.
    pub fn cancel(expected: OrderStatus) -> Self {
        Self {
            expected,
            target: OrderStatus::Cancelled,
            restore_inventory: true,
        }
    }
}

/// Durable store of orders.
///
/// Line snapshots and totals are write-once; only the status fields change
/// after creation.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Commits a placement as one all-or-nothing unit.
    ///
    /// Within a single atomic step the store:
    /// 1. returns the existing order if the draft's idempotency key was
    ///    already used by this customer;
    /// 2. checks the customer's cart is still at `expected_cart_version`;
    /// 3. conditionally decrements stock for every product in the draft,
    ///    requiring each product to be active;
    /// 4. inserts the order and empties the cart.
    ///
    /// If any step fails nothing is visible.
    async fn create_order_atomic(
        &self,
        draft: OrderDraft,
        expected_cart_version: u64,
    ) -> Result<Placement>;

    /// Loads an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Finds the order a customer already placed under an idempotency key.
    async fn find_order_by_idempotency_key(
        &self,
        customer_id: UserId,
        key: &str,
    ) -> Result<Option<Order>>;

    /// Lists a customer's orders, newest first.
    async fn list_orders_for_customer(
        &self,
        customer_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>>;

    /// Lists every order, newest first.
    async fn list_all_orders(&self) -> Result<Vec<Order>>;

    /// Applies a status transition atomically, restoring inventory if asked.
    async fn transition_order_status(
        &self,
        id: OrderId,
        transition: StatusTransition,
    ) -> Result<Order>;

    /// Sets the payment status; `Paid` stamps `paid_at` with the current time.
    async fn set_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order>;

    /// Number of orders.
    async fn order_count(&self) -> Result<u64>;

    /// Sum of `total_price` over paid orders.
    async fn paid_revenue(&self) -> Result<Money>;
}

/// Everything the services need from a backend.
pub trait Store: InventoryStore + CartStore + OrderRepository + Clone + 'static {}

impl<T: InventoryStore + CartStore + OrderRepository + Clone + 'static> Store for T {}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait StoreExt: Store {
    /// Gathers the dashboard figures.
    async fn dashboard_stats(&self) -> Result<DashboardStats> {
        Ok(DashboardStats {
            total_customers: self.customer_count().await?,
            total_products: self.product_count().await?,
            total_orders: self.order_count().await?,
            total_revenue: self.paid_revenue().await?,
        })
    }

    /// Current stock of a product, if it exists.
    async fn stock_of(&self, id: ProductId) -> Result<Option<u32>> {
        Ok(self.get_product(id).await?.map(|p| p.stock))
    }
}

// Blanket implementation for all Store implementations
impl<T: Store> StoreExt for T {}
