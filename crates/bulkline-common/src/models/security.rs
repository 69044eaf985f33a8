//! Per-admin security settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SecuritySettings {
    pub user_id: Uuid,
    pub two_factor_enabled: bool,
    pub session_timeout_minutes: i32,
    /// Addresses or CIDR ranges allowed to sign in; empty means any
    pub ip_whitelist: Vec<String>,
    pub login_alerts: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSecuritySettingsRequest {
    pub two_factor_enabled: Option<bool>,

    #[validate(range(min = 5, max = 1440, message = "Session timeout must be 5-1440 minutes"))]
    pub session_timeout_minutes: Option<i32>,

    #[validate(length(max = 50, message = "At most 50 whitelist entries"))]
    pub ip_whitelist: Option<Vec<String>>,

    pub login_alerts: Option<bool>,
}
