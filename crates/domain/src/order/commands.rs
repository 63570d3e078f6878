//! Order commands.

use common::{OrderId, PaymentMethod, ShippingAddress};

/// Command to turn the caller's cart into an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,

    /// Client token; retrying with the same key returns the first order.
    pub idempotency_key: Option<String>,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(shipping_address: ShippingAddress, payment_method: PaymentMethod) -> Self {
        Self {
            shipping_address,
            payment_method,
            idempotency_key: None,
        }
    }

    /// Attaches an idempotency key.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Command to overwrite an order's fulfillment status.
///
/// The status arrives unparsed so unrecognized values surface as
/// `InvalidStatus`.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: String,
}

impl UpdateOrderStatus {
    /// Creates a new UpdateOrderStatus command.
    pub fn new(order_id: OrderId, status: impl Into<String>) -> Self {
        Self {
            order_id,
            status: status.into(),
        }
    }
}

/// Command to set an order's payment status.
#[derive(Debug, Clone)]
pub struct UpdatePaymentStatus {
    pub order_id: OrderId,
    pub status: String,
}

impl UpdatePaymentStatus {
    /// Creates a new UpdatePaymentStatus command.
    pub fn new(order_id: OrderId, status: impl Into<String>) -> Self {
        Self {
            order_id,
            status: status.into(),
        }
    }
}

/// Command to cancel an order and restore its stock.
#[derive(Debug, Clone, Copy)]
pub struct CancelOrder {
    pub order_id: OrderId,
}

impl CancelOrder {
    /// Creates a new CancelOrder command.
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id }
    }
}
