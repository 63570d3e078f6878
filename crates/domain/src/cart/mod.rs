//! Customer carts.

mod service;
mod view;

pub use service::CartService;
pub use view::{CartLineView, CartView};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// Quantities must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The product does not exist in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product is not in the cart.
    #[error("Item not found in cart: {0}")]
    ItemNotFound(ProductId),
}
