//! API route modules.

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod campaigns;
pub mod contacts;
pub mod credentials;
pub mod credits;
pub mod functions;
pub mod health;
pub mod imports;
pub mod profile;
pub mod services;
pub mod uploads;

use serde::Deserialize;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// `?limit=&offset=` for plain listings.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Clamp user-supplied paging to sane bounds.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

/// Cache key for a tenant's dashboard summary.
pub fn dashboard_cache_key(user_id: uuid::Uuid) -> String {
    format!("analytics:dashboard:{user_id}")
}

/// Drop cached reads that depend on a tenant's contacts, campaigns or credits.
pub fn invalidate_tenant_cache(perf: &bulkline_cache::PerformanceContext, user_id: uuid::Uuid) {
    perf.cache.remove(&dashboard_cache_key(user_id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_is_clamped() {
        assert_eq!(page(None, None), (50, 0));
        assert_eq!(page(Some(0), Some(-5)), (1, 0));
        assert_eq!(page(Some(10_000), Some(40)), (200, 40));
    }
}
