//! Campaign repository — campaigns and their per-recipient message history.

use bulkline_common::models::campaign::{
    Campaign, CampaignChannel, CampaignStatus, MessageHistory, MessageStatus,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Row shape for message-history bulk inserts.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub recipient: String,
    pub status: MessageStatus,
    pub gateway_message_id: Option<String>,
    pub error: Option<String>,
    pub cost: i64,
}

pub async fn create_campaign(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    name: &str,
    message: &str,
    sender_id: Option<&str>,
    channel: CampaignChannel,
    group_id: Option<Uuid>,
    recipients: &[String],
    scheduled_at: Option<DateTime<Utc>>,
) -> Result<Campaign, sqlx::Error> {
    let status = if scheduled_at.is_some() {
        CampaignStatus::Scheduled
    } else {
        CampaignStatus::Draft
    };

    sqlx::query_as::<_, Campaign>(
        r#"
        INSERT INTO campaigns (id, user_id, name, message, sender_id, channel, status, group_id,
                               recipients, scheduled_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(message)
    .bind(sender_id)
    .bind(channel)
    .bind(status)
    .bind(group_id)
    .bind(recipients)
    .bind(scheduled_at)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Campaign>, sqlx::Error> {
    sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_campaigns(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Campaign>, sqlx::Error> {
    sqlx::query_as::<_, Campaign>(
        "SELECT * FROM campaigns WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Update an unsent campaign. Returns `None` if it does not exist, belongs
/// to someone else, or has already left the draft/scheduled states.
pub async fn update_campaign(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
    name: Option<&str>,
    message: Option<&str>,
    sender_id: Option<&str>,
    group_id: Option<Uuid>,
    recipients: Option<&[String]>,
    scheduled_at: Option<DateTime<Utc>>,
) -> Result<Option<Campaign>, sqlx::Error> {
    sqlx::query_as::<_, Campaign>(
        r#"
        UPDATE campaigns SET
            name = COALESCE($3, name),
            message = COALESCE($4, message),
            sender_id = COALESCE($5, sender_id),
            group_id = COALESCE($6, group_id),
            recipients = COALESCE($7, recipients),
            scheduled_at = COALESCE($8, scheduled_at),
            status = CASE WHEN $8::timestamptz IS NOT NULL THEN 'scheduled' ELSE status END,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2 AND status IN ('draft', 'scheduled')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(message)
    .bind(sender_id)
    .bind(group_id)
    .bind(recipients)
    .bind(scheduled_at)
    .fetch_optional(pool)
    .await
}

pub async fn delete_campaign(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM campaigns WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Move a draft/scheduled campaign to `sending`. Returns `false` when another
/// request already claimed it.
pub async fn mark_sending(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns SET status = 'sending', updated_at = NOW()
        WHERE id = $1 AND user_id = $2 AND status IN ('draft', 'scheduled')
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Record the outcome of a send.
pub async fn finish_send(
    pool: &PgPool,
    id: Uuid,
    status: CampaignStatus,
    recipient_count: i32,
    cost: i64,
) -> Result<Campaign, sqlx::Error> {
    sqlx::query_as::<_, Campaign>(
        r#"
        UPDATE campaigns SET
            status = $2,
            recipient_count = $3,
            cost = $4,
            sent_at = CASE WHEN $2 = 'sent' THEN NOW() ELSE sent_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(recipient_count)
    .bind(cost)
    .fetch_one(pool)
    .await
}

pub async fn campaigns_by_status(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT status, COUNT(*) FROM campaigns WHERE user_id = $1 GROUP BY status ORDER BY status",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

// ── Message history ───────────────────────────────────────────────────────────

/// Insert one history row per recipient of a campaign send.
pub async fn insert_messages(
    pool: &PgPool,
    user_id: Uuid,
    campaign_id: Option<Uuid>,
    message: &str,
    rows: &[NewMessage],
) -> Result<u64, sqlx::Error> {
    if rows.is_empty() {
        return Ok(0);
    }

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let recipients: Vec<String> = rows.iter().map(|r| r.recipient.clone()).collect();
    let statuses: Vec<String> = rows.iter().map(|r| r.status.as_str().to_string()).collect();
    let gateway_ids: Vec<Option<String>> =
        rows.iter().map(|r| r.gateway_message_id.clone()).collect();
    let errors: Vec<Option<String>> = rows.iter().map(|r| r.error.clone()).collect();
    let costs: Vec<i64> = rows.iter().map(|r| r.cost).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO message_history (id, user_id, campaign_id, recipient, message, status,
                                     gateway_message_id, error, cost, created_at)
        SELECT t.id, $2, $3, t.recipient, $4, t.status, t.gateway_message_id, t.error, t.cost, NOW()
        FROM UNNEST($1::uuid[], $5::text[], $6::text[], $7::text[], $8::text[], $9::bigint[])
            AS t(id, recipient, status, gateway_message_id, error, cost)
        "#,
    )
    .bind(&ids)
    .bind(user_id)
    .bind(campaign_id)
    .bind(message)
    .bind(&recipients)
    .bind(&statuses)
    .bind(&gateway_ids)
    .bind(&errors)
    .bind(&costs)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn list_messages(
    pool: &PgPool,
    user_id: Uuid,
    campaign_id: Option<Uuid>,
    status: Option<MessageStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<MessageHistory>, sqlx::Error> {
    sqlx::query_as::<_, MessageHistory>(
        r#"
        SELECT * FROM message_history
        WHERE user_id = $1
          AND ($2::uuid IS NULL OR campaign_id = $2)
          AND ($3::text IS NULL OR status = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(user_id)
    .bind(campaign_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn messages_by_status(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT status, COUNT(*) FROM message_history WHERE user_id = $1 GROUP BY status ORDER BY status",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
