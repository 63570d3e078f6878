//! Domain layer for the order core.
//!
//! This crate provides the services the API drives:
//! - CartService for the caller's own cart
//! - OrderLifecycleManager for placement, status changes and payments
//! - DashboardAggregator for admin figures
//! - CatalogService, the narrow catalog surface used for seeding

pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod error;
pub mod order;

pub use cart::{CartError, CartLineView, CartService, CartView};
pub use catalog::CatalogService;
pub use dashboard::DashboardAggregator;
pub use error::DomainError;
pub use order::{
    CancelOrder, OrderError, OrderLifecycleManager, PlaceOrder, UpdateOrderStatus,
    UpdatePaymentStatus,
};
