//! Admin security settings repository.

use bulkline_common::models::security::SecuritySettings;
use sqlx::PgPool;
use uuid::Uuid;

/// Stored settings, creating the default row on first read.
pub async fn get_or_create(pool: &PgPool, user_id: Uuid) -> Result<SecuritySettings, sqlx::Error> {
    sqlx::query(
        "INSERT INTO admin_security_settings (user_id, updated_at) VALUES ($1, NOW()) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, SecuritySettings>(
        "SELECT * FROM admin_security_settings WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn update_settings(
    pool: &PgPool,
    user_id: Uuid,
    two_factor_enabled: Option<bool>,
    session_timeout_minutes: Option<i32>,
    ip_whitelist: Option<&[String]>,
    login_alerts: Option<bool>,
) -> Result<SecuritySettings, sqlx::Error> {
    sqlx::query_as::<_, SecuritySettings>(
        r#"
        INSERT INTO admin_security_settings (user_id, two_factor_enabled, session_timeout_minutes,
                                             ip_whitelist, login_alerts, updated_at)
        VALUES ($1, COALESCE($2, FALSE), COALESCE($3, 60), COALESCE($4, '{}'),
                COALESCE($5, TRUE), NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            two_factor_enabled = COALESCE($2, admin_security_settings.two_factor_enabled),
            session_timeout_minutes = COALESCE($3, admin_security_settings.session_timeout_minutes),
            ip_whitelist = COALESCE($4, admin_security_settings.ip_whitelist),
            login_alerts = COALESCE($5, admin_security_settings.login_alerts),
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(two_factor_enabled)
    .bind(session_timeout_minutes)
    .bind(ip_whitelist)
    .bind(login_alerts)
    .fetch_one(pool)
    .await
}
