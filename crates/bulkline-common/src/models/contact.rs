//! Contacts and contact groups — the address book behind campaigns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A single recipient in a tenant's address book.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Normalized E.164 number, unique per owner
    pub phone: String,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Named set of contacts, used as a campaign audience.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactGroup {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Group listing row with a member count.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContactGroupSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactRequest {
    #[validate(length(min = 1, max = 100, message = "Contact name must be 1-100 characters"))]
    pub name: String,

    pub phone: String,

    pub email: Option<String>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContactRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    pub phone: Option<String>,

    pub email: Option<String>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Query parameters for listing contacts.
#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    /// Case-insensitive match against name or phone
    pub search: Option<String>,
    pub group_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GroupMembersRequest {
    #[validate(length(min = 1, max = 1000, message = "Provide 1-1000 contact ids"))]
    pub contact_ids: Vec<Uuid>,
}
