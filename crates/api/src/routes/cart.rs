//! Cart endpoints. Every handler acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use common::ProductId;
use domain::CartView;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::auth::Authenticated;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    /// Defaults to one unit.
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub success: bool,
    #[serde(flatten)]
    pub cart: CartView,
}

impl From<CartView> for CartResponse {
    fn from(cart: CartView) -> Self {
        Self {
            success: true,
            cart,
        }
    }
}

// -- Handlers --

/// POST /cart: add a product, merging with an existing line.
#[tracing::instrument(skip(state, body))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    body: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let quantity = parse_quantity(req.quantity.unwrap_or(1))?;

    let cart = state.carts.add(&principal, req.product_id, quantity).await?;
    Ok(Json(cart.into()))
}

/// GET /cart: the cart priced against the live catalog.
#[tracing::instrument(skip(state))]
pub async fn view<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<CartResponse>, ApiError> {
    Ok(Json(state.carts.view(&principal).await?.into()))
}

/// PUT /cart: overwrite the quantity of a line already in the cart.
#[tracing::instrument(skip(state, body))]
pub async fn set_quantity<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    body: Result<Json<SetQuantityRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let quantity = parse_quantity(req.quantity)?;

    let cart = state
        .carts
        .set_quantity(&principal, req.product_id, quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart: remove a product; absent products are ignored.
#[tracing::instrument(skip(state, body))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
    body: Result<Json<RemoveFromCartRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let cart = state.carts.remove(&principal, req.product_id).await?;
    Ok(Json(cart.into()))
}

fn parse_quantity(value: i64) -> Result<u32, ApiError> {
    u32::try_from(value)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| ApiError::Validation {
            code: "invalid_quantity",
            message: format!("Invalid quantity: {value} (must be between 1 and {})", u32::MAX),
        })
}
