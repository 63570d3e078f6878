//! Order placement and lifecycle.

mod commands;
mod lifecycle;

pub use commands::*;
pub use lifecycle::OrderLifecycleManager;

use common::{OrderId, OrderStatus, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Nothing to place.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart product is missing from the catalog or deactivated.
    #[error("Product unavailable: {0}")]
    ProductUnavailable(ProductId),

    /// A cart quantity exceeds the product's stock.
    #[error("Not enough stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: u32,
    },

    /// Unrecognized order status value.
    #[error("Invalid order status: {0}")]
    InvalidStatus(String),

    /// Unrecognized payment status value.
    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),

    /// A shipping address field is blank.
    #[error("Invalid shipping address: {field} is required")]
    InvalidShippingAddress { field: &'static str },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {0} is already cancelled")]
    AlreadyCancelled(OrderId),

    /// The order reached a state that cannot be cancelled.
    #[error("Order {order_id} cannot be cancelled from {status}")]
    NotCancellable {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Concurrent changes kept the operation from committing.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
}
