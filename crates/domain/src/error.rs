//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A cart operation was rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// An order operation was rejected.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// The principal may not perform the action.
    #[error("Not authorized to {action}")]
    NotAuthorized { action: &'static str },

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub(crate) fn not_authorized(action: &'static str) -> Self {
        DomainError::NotAuthorized { action }
    }
}
