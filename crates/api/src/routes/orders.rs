//! Order placement, queries and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::{Order, OrderId, PaymentMethod, ShippingAddress};
use domain::{CancelOrder, PlaceOrder, UpdateOrderStatus, UpdatePaymentStatus};
use serde::{Deserialize, Serialize};
use store::{PageRequest, Store};

use crate::AppState;
use crate::auth::Authenticated;
use crate::error::ApiError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// -- Request types --

/// Shipping address as submitted. Missing fields arrive blank and are
/// rejected by placement with `invalid_shipping_address`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShippingAddressRequest {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl From<ShippingAddressRequest> for ShippingAddress {
    fn from(req: ShippingAddressRequest) -> Self {
        ShippingAddress {
            full_name: req.full_name,
            phone: req.phone,
            address: req.address,
            city: req.city,
            postal_code: req.postal_code,
            country: req.country,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub shipping_address: ShippingAddressRequest,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    #[serde(alias = "paymentStatus")]
    pub payment_status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            success: true,
            order,
        }
    }
}

#[derive(Serialize)]
pub struct MyOrdersResponse {
    pub success: bool,
    pub page: u32,
    pub pages: u64,
    pub total_orders: u64,
    pub orders: Vec<Order>,
}

#[derive(Serialize)]
pub struct AllOrdersResponse {
    pub success: bool,
    pub count: usize,
    pub orders: Vec<Order>,
}

// -- Handlers --

/// POST /orders: place the caller's cart.
///
/// Returns 201 for a new order and 200 when an `Idempotency-Key` replays an
/// earlier one.
#[tracing::instrument(skip(state, headers, body))]
pub async fn place<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    headers: HeaderMap,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut cmd = PlaceOrder::new(req.shipping_address.into(), req.payment_method);
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }

    let placement = state.orders.place_order(&principal, cmd).await?;
    let status = if placement.is_replay() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(placement.into_order().into())))
}

/// GET /orders/my: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_mine<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<MyOrdersResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = PageRequest::new(
        query.page.and_then(|p| u32::try_from(p).ok()),
        query.limit.and_then(|l| u32::try_from(l).ok()),
    );

    let page = state.orders.list_my_orders(&principal, request).await?;
    Ok(Json(MyOrdersResponse {
        success: true,
        page: page.request.page,
        pages: page.pages(),
        total_orders: page.total,
        orders: page.items,
    }))
}

/// GET /orders: every order, newest first. Admin only.
#[tracing::instrument(skip(state))]
pub async fn list_all<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<AllOrdersResponse>, ApiError> {
    let orders = state.orders.list_all_orders(&principal).await?;
    Ok(Json(AllOrdersResponse {
        success: true,
        count: orders.len(),
        orders,
    }))
}

/// GET /orders/{id}: one order, for its owner or an admin.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.get_order(&principal, order_id).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/cancel: cancel and restore stock. Owner or admin.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .cancel(&principal, CancelOrder::new(order_id))
        .await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/status: overwrite the fulfillment status. Admin only.
#[tracing::instrument(skip(state, body))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let order = state
        .orders
        .update_status(&principal, UpdateOrderStatus::new(order_id, req.status))
        .await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/payment: set the payment status. Admin only.
#[tracing::instrument(skip(state, body))]
pub async fn update_payment<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    body: Result<Json<UpdatePaymentRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let order = state
        .orders
        .update_payment_status(
            &principal,
            UpdatePaymentStatus::new(order_id, req.payment_status),
        )
        .await?;
    Ok(Json(order.into()))
}

// -- Helpers --

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::bad_request(format!("Invalid order ID: {e}")))
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| ApiError::bad_request("Idempotency-Key must be visible ASCII"))?
        .trim();
    if key.is_empty() || key.len() > 255 {
        return Err(ApiError::bad_request(
            "Idempotency-Key must be 1 to 255 characters",
        ));
    }
    Ok(Some(key.to_string()))
}
