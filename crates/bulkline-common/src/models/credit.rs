//! Credit balance and the transaction ledger behind billing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Current balance, one row per user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditAccount {
    pub user_id: Uuid,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry. `amount` is signed: purchases are positive, usage negative.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    /// External reference such as an M-Pesa receipt number
    pub reference: Option<String>,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Usage,
    Adjustment,
    Refund,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseCreditsRequest {
    #[validate(range(min = 1, max = 10_000_000, message = "Amount must be between 1 and 10,000,000"))]
    pub amount: i64,

    /// Payment receipt, e.g. an M-Pesa confirmation code. Each receipt can
    /// be credited once.
    #[validate(length(min = 1, max = 64, message = "Payment reference is required"))]
    pub reference: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustCreditsRequest {
    pub user_id: Uuid,

    /// Positive to grant, negative to claw back
    pub amount: i64,

    #[validate(length(min = 1, max = 255, message = "A reason is required"))]
    pub description: String,
}

/// Query parameters for ledger listings.
#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
