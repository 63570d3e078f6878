//! Admin dashboard figures.

use common::Principal;
use store::{DashboardStats, Store, StoreExt};

use crate::error::DomainError;

/// Read-only aggregation over customers, products and orders.
#[derive(Clone)]
pub struct DashboardAggregator<S: Store> {
    store: S,
}

impl<S: Store> DashboardAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the current counts and the revenue of paid orders. Admin only.
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn stats(&self, principal: &Principal) -> Result<DashboardStats, DomainError> {
        if !principal.is_admin() {
            return Err(DomainError::not_authorized("view the dashboard"));
        }
        Ok(self.store.dashboard_stats().await?)
    }
}
