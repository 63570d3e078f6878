//! HTTP API server for the order core.
//!
//! Provides REST endpoints for carts, order placement and lifecycle, and the
//! admin dashboard, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CartService, CatalogService, DashboardAggregator, OrderLifecycleManager};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub carts: CartService<S>,
    pub orders: OrderLifecycleManager<S>,
    pub dashboard: DashboardAggregator<S>,
    pub catalog: CatalogService<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart",
            get(routes::cart::view::<S>)
                .post(routes::cart::add::<S>)
                .put(routes::cart::set_quantity::<S>)
                .delete(routes::cart::remove::<S>),
        )
        .route(
            "/orders",
            post(routes::orders::place::<S>).get(routes::orders::list_all::<S>),
        )
        .route("/orders/my", get(routes::orders::list_mine::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", put(routes::orders::cancel::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route(
            "/orders/{id}/payment",
            put(routes::orders::update_payment::<S>),
        )
        .route("/admin/dashboard", get(routes::admin::dashboard::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state with every service sharing one store.
pub fn create_default_state<S: Store>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        carts: CartService::new(store.clone()),
        orders: OrderLifecycleManager::new(store.clone()),
        dashboard: DashboardAggregator::new(store.clone()),
        catalog: CatalogService::new(store),
    })
}
