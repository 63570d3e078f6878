//! Admin dashboard endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::Money;
use serde::Serialize;
use store::Store;

use crate::AppState;
use crate::auth::Authenticated;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub total_customers: u64,
    pub total_products: u64,
    pub total_orders: u64,
    /// Paid revenue in cents.
    pub total_revenue: Money,
}

/// GET /admin/dashboard: counts and paid revenue. Admin only.
#[tracing::instrument(skip(state))]
pub async fn dashboard<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<DashboardResponse>, ApiError> {
    let stats = state.dashboard.stats(&principal).await?;
    Ok(Json(DashboardResponse {
        success: true,
        total_customers: stats.total_customers,
        total_products: stats.total_products,
        total_orders: stats.total_orders,
        total_revenue: stats.total_revenue,
    }))
}
