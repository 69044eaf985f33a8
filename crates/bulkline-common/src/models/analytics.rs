//! Dashboard read models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: i64,
}

/// Client dashboard numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub contacts: i64,
    pub groups: i64,
    pub credit_balance: i64,
    pub campaigns_by_status: Vec<StatusCount>,
    pub messages_by_status: Vec<StatusCount>,
    /// Messages per day over the last 30 days
    pub daily_messages: Vec<DailyCount>,
}

/// Admin dashboard numbers across all tenants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSummary {
    pub users: i64,
    pub active_users: i64,
    pub messages_sent: i64,
    pub credits_sold: i64,
    pub pending_activation_requests: i64,
}
