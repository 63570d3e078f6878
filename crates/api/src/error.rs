//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, DomainError, OrderError};

/// API-level error type that maps to HTTP responses.
///
/// Every failure renders as `{"success": false, "code": ..., "message": ...}`
/// with a stable snake_case code.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed principal headers.
    Unauthenticated(String),
    /// Request rejected before reaching the domain.
    Validation { code: &'static str, message: String },
    /// Domain logic error.
    Domain(DomainError),
}

impl ApiError {
    /// Malformed body, path or query.
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Validation {
            code: "invalid_request",
            message: message.into(),
        }
    }

    /// Returns the HTTP status and stable error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::Validation { code, .. } => (StatusCode::BAD_REQUEST, *code),
            ApiError::Domain(err) => domain_status_and_code(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match self {
            ApiError::Unauthenticated(msg) => msg,
            ApiError::Validation { message, .. } => message,
            ApiError::Domain(DomainError::Store(err)) => {
                tracing::error!(error = %err, "store failure");
                "internal server error".to_string()
            }
            ApiError::Domain(err) => err.to_string(),
        };

        metrics::counter!("api_errors_total", "code" => code).increment(1);

        let body = serde_json::json!({
            "success": false,
            "code": code,
            "message": message,
        });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status_and_code(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::Cart(cart_err) => match cart_err {
            CartError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, "invalid_quantity"),
            CartError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "product_not_found"),
            CartError::ItemNotFound(_) => (StatusCode::NOT_FOUND, "item_not_found"),
        },
        DomainError::Order(order_err) => match order_err {
            OrderError::EmptyCart => (StatusCode::BAD_REQUEST, "empty_cart"),
            OrderError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "invalid_status"),
            OrderError::InvalidPaymentStatus(_) => {
                (StatusCode::BAD_REQUEST, "invalid_payment_status")
            }
            OrderError::InvalidShippingAddress { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_shipping_address")
            }
            OrderError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
            OrderError::ProductUnavailable(_) => (StatusCode::CONFLICT, "product_unavailable"),
            OrderError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
            OrderError::AlreadyCancelled(_) => (StatusCode::CONFLICT, "already_cancelled"),
            OrderError::NotCancellable { .. } => (StatusCode::CONFLICT, "not_cancellable"),
            OrderError::ConcurrentModification(_) => {
                (StatusCode::CONFLICT, "concurrent_modification")
            }
        },
        DomainError::NotAuthorized { .. } => (StatusCode::FORBIDDEN, "not_authorized"),
        DomainError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    #[test]
    fn test_conflicts_map_to_409() {
        let err = ApiError::from(DomainError::from(OrderError::AlreadyCancelled(
            OrderId::new(),
        )));
        assert_eq!(
            err.status_and_code(),
            (StatusCode::CONFLICT, "already_cancelled")
        );
    }

    #[test]
    fn test_store_failures_are_internal() {
        let err = ApiError::from(DomainError::Store(store::StoreError::InvalidRecord(
            "bad row".into(),
        )));
        assert_eq!(
            err.status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        );
    }

    #[test]
    fn test_bad_request_code() {
        assert_eq!(
            ApiError::bad_request("nope").status_and_code(),
            (StatusCode::BAD_REQUEST, "invalid_request")
        );
    }
}
