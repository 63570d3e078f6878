use common::{OrderId, OrderStatus, ProductId, UserId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product exists but is inactive, or vanished before commit.
    #[error("Product not available: {0}")]
    ProductUnavailable(ProductId),

    /// A conditional decrement found less stock than requested.
    #[error("Insufficient stock for {name} ({product_id}): requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: u32,
    },

    /// An increment would overflow the stock counter.
    #[error("Stock overflow for product {0}")]
    StockOverflow(ProductId),

    /// The product is not in the customer's cart.
    #[error("Cart item not found: {product_id}")]
    CartItemNotFound { product_id: ProductId },

    /// The cart changed between validation and commit.
    #[error("Cart for customer {customer_id} changed: expected version {expected}, found {actual}")]
    CartVersionConflict {
        customer_id: UserId,
        expected: u64,
        actual: u64,
    },

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order's status changed between read and transition.
    #[error("Order {order_id} status changed: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A persisted row could not be mapped back into a record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
