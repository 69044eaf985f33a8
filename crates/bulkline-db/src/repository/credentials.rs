//! Credential repository — upstream gateway logins and platform API keys.

use bulkline_common::models::credential::{ApiCredential, GatewayCredential};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn get_gateway_credential(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<GatewayCredential>, sqlx::Error> {
    sqlx::query_as::<_, GatewayCredential>("SELECT * FROM gateway_credentials WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Insert or replace a user's gateway login.
pub async fn upsert_gateway_credential(
    pool: &PgPool,
    user_id: Uuid,
    username: &str,
    api_key: &str,
    sender_id: Option<&str>,
    is_reseller: bool,
) -> Result<GatewayCredential, sqlx::Error> {
    sqlx::query_as::<_, GatewayCredential>(
        r#"
        INSERT INTO gateway_credentials (user_id, username, api_key, sender_id, is_reseller,
                                         created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            username = EXCLUDED.username,
            api_key = EXCLUDED.api_key,
            sender_id = EXCLUDED.sender_id,
            is_reseller = EXCLUDED.is_reseller,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(api_key)
    .bind(sender_id)
    .bind(is_reseller)
    .fetch_one(pool)
    .await
}

pub async fn delete_gateway_credential(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM gateway_credentials WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ── API keys ──────────────────────────────────────────────────────────────────

pub async fn create_api_credential(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    name: &str,
    key_prefix: &str,
    key_hash: &str,
) -> Result<ApiCredential, sqlx::Error> {
    sqlx::query_as::<_, ApiCredential>(
        r#"
        INSERT INTO api_credentials (id, user_id, name, key_prefix, key_hash, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(key_prefix)
    .bind(key_hash)
    .fetch_one(pool)
    .await
}

pub async fn list_api_credentials(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ApiCredential>, sqlx::Error> {
    sqlx::query_as::<_, ApiCredential>(
        "SELECT * FROM api_credentials WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Revoke a key. Returns `false` if it was missing or already revoked.
pub async fn revoke_api_credential(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE api_credentials SET revoked_at = NOW() WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL",
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Look up a live key by its hash and stamp `last_used_at`.
pub async fn use_api_credential(
    pool: &PgPool,
    key_hash: &str,
) -> Result<Option<ApiCredential>, sqlx::Error> {
    sqlx::query_as::<_, ApiCredential>(
        r#"
        UPDATE api_credentials SET last_used_at = NOW()
        WHERE key_hash = $1 AND revoked_at IS NULL
        RETURNING *
        "#,
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await
}
