//! User repository — CRUD operations for accounts in both portals.

use bulkline_common::models::user::{User, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new user account.
pub async fn create_user(
    pool: &PgPool,
    id: Uuid,
    email: &str,
    password_hash: &str,
    full_name: &str,
    company_name: Option<&str>,
    phone: Option<&str>,
    role: UserRole,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, company_name, phone, role,
                           is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(password_hash)
    .bind(full_name)
    .bind(company_name)
    .bind(phone)
    .bind(role)
    .fetch_one(pool)
    .await
}

/// Find a user by their unique ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Find a user by email (case-insensitive).
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Update profile fields; `None` leaves a column unchanged.
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    full_name: Option<&str>,
    company_name: Option<&str>,
    phone: Option<&str>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            full_name = COALESCE($2, full_name),
            company_name = COALESCE($3, company_name),
            phone = COALESCE($4, phone),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(company_name)
    .bind(phone)
    .fetch_one(pool)
    .await
}

/// Admin change of activation flag and/or role.
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    is_active: Option<bool>,
    role: Option<UserRole>,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            is_active = COALESCE($2, is_active),
            role = COALESCE($3, role),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(is_active)
    .bind(role)
    .fetch_optional(pool)
    .await
}

/// List accounts, newest first.
pub async fn list_users(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}

/// Count accounts, returning `(total, active)`.
pub async fn count_users(pool: &PgPool) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM users")
        .fetch_one(pool)
        .await
}
