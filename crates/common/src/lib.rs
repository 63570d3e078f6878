//! Shared types for the order-processing workspace.
//!
//! Identifiers, money, principals and the product, cart and order records
//! that both the store backends and the domain services work with.

pub mod cart;
pub mod money;
pub mod order;
pub mod principal;
pub mod product;
pub mod types;

pub use cart::{Cart, CartItem};
pub use money::Money;
pub use order::{
    Order, OrderDraft, OrderLineSnapshot, OrderStatus, ParseEnumError, PaymentMethod,
    PaymentStatus, ShippingAddress, quantities_by_product,
};
pub use principal::{Principal, Role};
pub use product::Product;
pub use types::{OrderId, ProductId, UserId};
