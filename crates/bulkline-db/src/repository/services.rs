//! Service repository — catalog, subscriptions, and activation requests.

use bulkline_common::models::service::{
    ActivationStatus, Service, ServiceActivationRequest, ServiceCategory, ServiceSubscription,
};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn list_services(pool: &PgPool, only_active: bool) -> Result<Vec<Service>, sqlx::Error> {
    sqlx::query_as::<_, Service>(
        "SELECT * FROM services WHERE ($1 = FALSE OR is_active) ORDER BY category, name",
    )
    .bind(only_active)
    .fetch_all(pool)
    .await
}

pub async fn find_service(pool: &PgPool, id: Uuid) -> Result<Option<Service>, sqlx::Error> {
    sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_service(
    pool: &PgPool,
    id: Uuid,
    code: &str,
    name: &str,
    description: Option<&str>,
    category: ServiceCategory,
    monthly_price: i64,
) -> Result<Service, sqlx::Error> {
    sqlx::query_as::<_, Service>(
        r#"
        INSERT INTO services (id, code, name, description, category, monthly_price, is_active,
                              created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(code)
    .bind(name)
    .bind(description)
    .bind(category)
    .bind(monthly_price)
    .fetch_one(pool)
    .await
}

// ── Subscriptions ─────────────────────────────────────────────────────────────

pub async fn list_subscriptions(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ServiceSubscription>, sqlx::Error> {
    sqlx::query_as::<_, ServiceSubscription>(
        "SELECT * FROM service_subscriptions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Create or re-activate a subscription.
pub async fn activate_subscription(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    service_id: Uuid,
) -> Result<ServiceSubscription, sqlx::Error> {
    sqlx::query_as::<_, ServiceSubscription>(
        r#"
        INSERT INTO service_subscriptions (id, user_id, service_id, status, started_at,
                                           created_at, updated_at)
        VALUES ($1, $2, $3, 'active', NOW(), NOW(), NOW())
        ON CONFLICT (user_id, service_id) DO UPDATE SET
            status = 'active',
            started_at = NOW(),
            cancelled_at = NULL,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(service_id)
    .fetch_one(pool)
    .await
}

pub async fn cancel_subscription(
    pool: &PgPool,
    user_id: Uuid,
    service_id: Uuid,
) -> Result<Option<ServiceSubscription>, sqlx::Error> {
    sqlx::query_as::<_, ServiceSubscription>(
        r#"
        UPDATE service_subscriptions SET
            status = 'cancelled',
            cancelled_at = NOW(),
            updated_at = NOW()
        WHERE user_id = $1 AND service_id = $2 AND status <> 'cancelled'
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(service_id)
    .fetch_optional(pool)
    .await
}

// ── Activation requests ───────────────────────────────────────────────────────

pub async fn create_activation_request(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    service_id: Uuid,
    notes: Option<&str>,
) -> Result<ServiceActivationRequest, sqlx::Error> {
    sqlx::query_as::<_, ServiceActivationRequest>(
        r#"
        INSERT INTO service_activation_requests (id, user_id, service_id, status, notes,
                                                 created_at, updated_at)
        VALUES ($1, $2, $3, 'pending', $4, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(service_id)
    .bind(notes)
    .fetch_one(pool)
    .await
}

/// Whether the user already has an open request for a service.
pub async fn has_pending_request(
    pool: &PgPool,
    user_id: Uuid,
    service_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM service_activation_requests
            WHERE user_id = $1 AND service_id = $2 AND status = 'pending')
        "#,
    )
    .bind(user_id)
    .bind(service_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn list_user_requests(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ServiceActivationRequest>, sqlx::Error> {
    sqlx::query_as::<_, ServiceActivationRequest>(
        "SELECT * FROM service_activation_requests WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Admin queue, oldest first.
pub async fn list_requests(
    pool: &PgPool,
    status: Option<ActivationStatus>,
) -> Result<Vec<ServiceActivationRequest>, sqlx::Error> {
    sqlx::query_as::<_, ServiceActivationRequest>(
        r#"
        SELECT * FROM service_activation_requests
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at
        "#,
    )
    .bind(status)
    .fetch_all(pool)
    .await
}

/// Resolve a pending request. Returns `None` if it is missing or already reviewed.
pub async fn review_request(
    pool: &PgPool,
    id: Uuid,
    reviewer: Uuid,
    status: ActivationStatus,
    admin_notes: Option<&str>,
) -> Result<Option<ServiceActivationRequest>, sqlx::Error> {
    sqlx::query_as::<_, ServiceActivationRequest>(
        r#"
        UPDATE service_activation_requests SET
            status = $3,
            admin_notes = $4,
            reviewed_by = $2,
            reviewed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(reviewer)
    .bind(status)
    .bind(admin_notes)
    .fetch_optional(pool)
    .await
}

pub async fn count_pending_requests(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM service_activation_requests WHERE status = 'pending'",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
