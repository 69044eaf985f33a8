//! Aggregate queries behind the dashboards.

use bulkline_common::models::analytics::DailyCount;
use sqlx::PgPool;
use uuid::Uuid;

/// Messages per day for the last `days` days, gaps filled with zero.
pub async fn daily_messages(
    pool: &PgPool,
    user_id: Uuid,
    days: i32,
) -> Result<Vec<DailyCount>, sqlx::Error> {
    sqlx::query_as::<_, DailyCount>(
        r#"
        SELECT d.day::date AS day, COUNT(m.id) AS count
        FROM generate_series(CURRENT_DATE - ($2 - 1), CURRENT_DATE, INTERVAL '1 day') AS d(day)
        LEFT JOIN message_history m
            ON m.user_id = $1 AND m.created_at::date = d.day::date
        GROUP BY d.day
        ORDER BY d.day
        "#,
    )
    .bind(user_id)
    .bind(days)
    .fetch_all(pool)
    .await
}

/// Messages accepted by the gateway across all tenants.
pub async fn total_messages_sent(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM message_history WHERE status IN ('sent', 'delivered')",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
