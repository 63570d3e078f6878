use common::Money;

/// Page selection for order listings.
///
/// Pages are 1-based. Out-of-range values fall back to the defaults and the
/// limit is capped so a single request cannot pull the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 5;
    pub const MAX_LIMIT: u32 = 100;

    /// Builds a page request from optional, possibly invalid inputs.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.filter(|p| *p >= 1).unwrap_or(Self::DEFAULT_PAGE),
            limit: limit
                .filter(|l| *l >= 1)
                .unwrap_or(Self::DEFAULT_LIMIT)
                .min(Self::MAX_LIMIT),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    /// Total number of pages for the request's limit.
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.request.limit))
    }
}

/// Aggregate figures for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardStats {
    pub total_customers: u64,
    pub total_products: u64,
    pub total_orders: u64,
    /// Sum of `total_price` over orders whose payment status is `Paid`.
    pub total_revenue: Money,
}
