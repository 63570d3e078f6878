//! Order records, line snapshots and the status enums.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Money, OrderId, Product, ProductId, UserId};

/// Error returned when a status or method name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Fulfillment status of an order.
///
/// ```text
/// Pending ──► Processing ──► Shipped ──► Delivered
///    │            │             │
///    └────────────┴─────────────┴──► Cancelled
/// ```
///
/// `Delivered` and `Cancelled` are terminal. Placement creates orders
/// directly in `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "order status",
                value: s.to_string(),
            })
    }
}

/// Payment status, set manually or by an external payment process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Paid" => Ok(PaymentStatus::Paid),
            "Failed" => Ok(PaymentStatus::Failed),
            other => Err(ParseEnumError {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    CashOnDelivery,
    #[serde(rename = "ONLINE")]
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "COD",
            PaymentMethod::Online => "ONLINE",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(PaymentMethod::CashOnDelivery),
            "ONLINE" => Ok(PaymentMethod::Online),
            other => Err(ParseEnumError {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

/// Where the order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Returns the name of the first blank field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Purchase-time copy of a product inside an order.
///
/// Never changes after placement, whatever happens to the catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLineSnapshot {
    /// Captures the product's current name, first image and price.
    pub fn capture(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            image: product.primary_image().map(str::to_string),
            unit_price: product.price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Total quantity per product across a set of lines, in ascending product
/// order. Stores lock and mutate stock in this order.
pub fn quantities_by_product(lines: &[OrderLineSnapshot]) -> BTreeMap<ProductId, u32> {
    let mut quantities = BTreeMap::new();
    for line in lines {
        *quantities.entry(line.product_id).or_insert(0u32) += line.quantity;
    }
    quantities
}

/// A validated order that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub customer_id: UserId,
    pub lines: Vec<OrderLineSnapshot>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub idempotency_key: Option<String>,
}

impl OrderDraft {
    pub fn total_price(&self) -> Money {
        self.lines.iter().map(OrderLineSnapshot::line_total).sum()
    }

    pub fn stock_requirements(&self) -> BTreeMap<ProductId, u32> {
        quantities_by_product(&self.lines)
    }

    /// Re-takes the snapshot of every line for `product`, keeping quantities.
    /// Stores call this with the locked record so the committed order carries
    /// the catalog state at commit time.
    pub fn recapture(&mut self, product: &Product) {
        for line in self.lines.iter_mut().filter(|l| l.product_id == product.id) {
            *line = OrderLineSnapshot::capture(product, line.quantity);
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub lines: Vec<OrderLineSnapshot>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Computed once at placement.
    pub total_price: Money,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materializes a draft as a freshly placed order.
    pub fn place(id: OrderId, draft: OrderDraft, now: DateTime<Utc>) -> Self {
        let total_price = draft.total_price();
        Self {
            id,
            customer_id: draft.customer_id,
            lines: draft.lines,
            shipping_address: draft.shipping_address,
            payment_method: draft.payment_method,
            total_price,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Processing,
            paid_at: None,
            idempotency_key: draft.idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a payment status; entering `Paid` stamps `paid_at`.
    pub fn apply_payment_status(&mut self, status: PaymentStatus, now: DateTime<Utc>) {
        self.payment_status = status;
        if status == PaymentStatus::Paid {
            self.paid_at = Some(now);
        }
        self.updated_at = now;
    }

    pub fn stock_requirements(&self) -> BTreeMap<ProductId, u32> {
        quantities_by_product(&self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Lovelace".into(),
            phone: "555-0100".into(),
            address: "12 Analytical St".into(),
            city: "London".into(),
            postal_code: "N1".into(),
            country: "UK".into(),
        }
    }

    #[test]
    fn status_parsing_accepts_only_known_values() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("Lost".parse::<OrderStatus>().is_err());
        assert!("processing".parse::<OrderStatus>().is_err());
        assert!("Refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn terminal_states_cannot_cancel() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Processing.can_cancel());
        assert!(OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn payment_method_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap(),
            "\"COD\""
        );
        assert_eq!("ONLINE".parse::<PaymentMethod>().unwrap(), PaymentMethod::Online);
    }

    #[test]
    fn missing_field_reports_first_blank() {
        let mut addr = address();
        assert_eq!(addr.missing_field(), None);
        addr.city = "  ".into();
        assert_eq!(addr.missing_field(), Some("city"));
    }

    #[test]
    fn placed_order_freezes_total_and_starts_processing() {
        let a = Product::new("A", Money::from_cents(1000), 5);
        let b = Product::new("B", Money::from_cents(250), 1);
        let draft = OrderDraft {
            customer_id: UserId::new(),
            lines: vec![
                OrderLineSnapshot::capture(&a, 2),
                OrderLineSnapshot::capture(&b, 1),
            ],
            shipping_address: address(),
            payment_method: PaymentMethod::Online,
            idempotency_key: None,
        };

        let order = Order::place(OrderId::new(), draft, Utc::now());

        assert_eq!(order.total_price.cents(), 2250);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.paid_at.is_none());
    }

    #[test]
    fn paid_stamps_paid_at() {
        let product = Product::new("A", Money::from_cents(100), 1);
        let draft = OrderDraft {
            customer_id: UserId::new(),
            lines: vec![OrderLineSnapshot::capture(&product, 1)],
            shipping_address: address(),
            payment_method: PaymentMethod::CashOnDelivery,
            idempotency_key: None,
        };
        let mut order = Order::place(OrderId::new(), draft, Utc::now());

        order.apply_payment_status(PaymentStatus::Failed, Utc::now());
        assert!(order.paid_at.is_none());

        let now = Utc::now();
        order.apply_payment_status(PaymentStatus::Paid, now);
        assert_eq!(order.paid_at, Some(now));
    }

    #[test]
    fn quantities_are_grouped_and_sorted() {
        let a = Product::new("A", Money::from_cents(100), 10);
        let b = Product::new("B", Money::from_cents(100), 10);
        let lines = vec![
            OrderLineSnapshot::capture(&a, 2),
            OrderLineSnapshot::capture(&b, 1),
            OrderLineSnapshot::capture(&a, 3),
        ];

        let quantities = quantities_by_product(&lines);

        assert_eq!(quantities.len(), 2);
        assert_eq!(quantities[&a.id], 5);
        assert_eq!(quantities[&b.id], 1);
        let keys: Vec<_> = quantities.keys().copied().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
