//! Analytics routes — the client dashboard summary.
//!
//! The summary is cached per tenant under `analytics:dashboard:{user_id}`.
//! Writes that change any of its inputs drop the entry; a stale entry is
//! rebuilt on the next read, and the maintenance task evicts unread ones.

use axum::{extract::Extension, extract::State, middleware, routing::get, Json, Router};
use bulkline_common::{
    error::BulklineResult,
    models::analytics::{DashboardSummary, PlatformSummary, StatusCount},
};
use bulkline_db::repository::{analytics, campaigns, contacts, credits, services, users};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{middleware::AuthContext, routes, AppState};

const DASHBOARD_DAYS: i32 = 30;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analytics/dashboard", get(dashboard))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

fn status_counts(rows: Vec<(String, i64)>) -> Vec<StatusCount> {
    rows.into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect()
}

async fn build_dashboard(pool: &PgPool, user_id: Uuid) -> Result<DashboardSummary, sqlx::Error> {
    Ok(DashboardSummary {
        contacts: contacts::count_contacts(pool, user_id).await?,
        groups: contacts::count_groups(pool, user_id).await?,
        credit_balance: credits::get_balance(pool, user_id).await?,
        campaigns_by_status: status_counts(campaigns::campaigns_by_status(pool, user_id).await?),
        messages_by_status: status_counts(campaigns::messages_by_status(pool, user_id).await?),
        daily_messages: analytics::daily_messages(pool, user_id, DASHBOARD_DAYS).await?,
    })
}

/// GET /api/v1/analytics/dashboard
async fn dashboard(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<DashboardSummary>> {
    let key = routes::dashboard_cache_key(auth.user_id);
    let summary = state
        .perf
        .read_through(&key, || build_dashboard(&state.db.pool, auth.user_id))
        .await?;
    Ok(Json(summary))
}

/// Cross-tenant numbers for the admin portal. Not cached.
pub(crate) async fn platform_summary(pool: &PgPool) -> Result<PlatformSummary, sqlx::Error> {
    let (total, active) = users::count_users(pool).await?;
    Ok(PlatformSummary {
        users: total,
        active_users: active,
        messages_sent: analytics::total_messages_sent(pool).await?,
        credits_sold: credits::total_purchased(pool).await?,
        pending_activation_requests: services::count_pending_requests(pool).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rows_become_counts() {
        let counts = status_counts(vec![("draft".into(), 2), ("sent".into(), 5)]);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[1].status, "sent");
        assert_eq!(counts[1].count, 5);
    }
}
