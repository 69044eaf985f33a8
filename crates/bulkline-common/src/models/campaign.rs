//! Campaigns and per-recipient message history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Characters per billable SMS segment.
pub const SMS_SEGMENT_LENGTH: usize = 160;

/// A bulk message addressed to explicit numbers and/or a contact group.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub message: String,
    pub sender_id: Option<String>,
    pub channel: CampaignChannel,
    pub status: CampaignStatus,
    pub group_id: Option<Uuid>,
    /// Explicit recipients in addition to the group
    pub recipients: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub recipient_count: i32,
    /// Credits charged when the campaign was sent
    pub cost: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignChannel {
    Sms,
    Whatsapp,
    Ussd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    /// Only campaigns that have not gone out yet may be edited or sent.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Scheduled)
    }
}

/// One message to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub recipient: String,
    pub message: String,
    pub status: MessageStatus,
    pub gateway_message_id: Option<String>,
    pub error: Option<String>,
    pub cost: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Queued,
    Sent,
    Delivered,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 150, message = "Campaign name must be 1-150 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 1600, message = "Message must be 1-1600 characters"))]
    pub message: String,

    #[validate(length(max = 11, message = "Sender ID can be at most 11 characters"))]
    pub sender_id: Option<String>,

    pub channel: Option<CampaignChannel>,

    pub group_id: Option<Uuid>,

    #[serde(default)]
    pub recipients: Vec<String>,

    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 1600))]
    pub message: Option<String>,

    #[validate(length(max = 11))]
    pub sender_id: Option<String>,

    pub group_id: Option<Uuid>,

    pub recipients: Option<Vec<String>>,

    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Query parameters for message history.
#[derive(Debug, Default, Deserialize)]
pub struct MessageHistoryQuery {
    pub campaign_id: Option<Uuid>,
    pub status: Option<MessageStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Number of billable segments for a message body.
///
/// Empty bodies still cost one segment.
pub fn segment_count(message: &str) -> i64 {
    let chars = message.chars().count();
    chars.div_ceil(SMS_SEGMENT_LENGTH).max(1) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_round_up() {
        assert_eq!(segment_count(""), 1);
        assert_eq!(segment_count(&"a".repeat(160)), 1);
        assert_eq!(segment_count(&"a".repeat(161)), 2);
        assert_eq!(segment_count(&"a".repeat(480)), 3);
    }

    #[test]
    fn only_unsent_campaigns_are_editable() {
        assert!(CampaignStatus::Draft.is_editable());
        assert!(CampaignStatus::Scheduled.is_editable());
        assert!(!CampaignStatus::Sent.is_editable());
        assert!(!CampaignStatus::Sending.is_editable());
    }
}
