//! Service catalog, subscriptions, and activation requests.
//!
//! Clients request a service (bulk SMS, WhatsApp, USSD short code, M-Pesa
//! integration); an admin reviews the request and approval creates the subscription.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: ServiceCategory,
    /// Monthly price in credits
    pub monthly_price: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Sms,
    Whatsapp,
    Ussd,
    Mpesa,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Suspended,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceActivationRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub status: ActivationStatus,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateServiceRequest {
    #[validate(length(min = 2, max = 32))]
    pub code: String,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub category: ServiceCategory,

    #[validate(range(min = 0))]
    pub monthly_price: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateActivationRequest {
    pub service_id: Uuid,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewActivationRequest {
    pub approve: bool,

    #[validate(length(max = 1000))]
    pub admin_notes: Option<String>,
}

/// Query parameters for the admin activation queue.
#[derive(Debug, Default, Deserialize)]
pub struct ActivationQuery {
    pub status: Option<ActivationStatus>,
}
