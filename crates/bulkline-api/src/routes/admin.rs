//! Admin portal routes. Every route requires a valid token *and* the admin role.
//!
//! GET   /api/v1/admin/users
//! PATCH /api/v1/admin/users/{user_id}
//! GET   /api/v1/admin/security            PUT same path
//! POST  /api/v1/admin/credits/adjust
//! GET   /api/v1/admin/services            POST same path
//! GET   /api/v1/admin/activation-requests
//! POST  /api/v1/admin/activation-requests/{request_id}/review
//! GET   /api/v1/admin/analytics
//! GET   /api/v1/admin/performance
//! POST  /api/v1/admin/performance/evict
//! POST  /api/v1/admin/performance/clear

use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use bulkline_cache::{ClearOptions, ClearReport, EvictionReport, PerformanceSnapshot};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    ids,
    models::{
        analytics::PlatformSummary,
        credit::{AdjustCreditsRequest, CreditTransaction, TransactionKind},
        security::{SecuritySettings, UpdateSecuritySettingsRequest},
        service::{
            ActivationQuery, ActivationStatus, CreateServiceRequest, ReviewActivationRequest,
            Service, ServiceActivationRequest,
        },
        user::{UpdateUserStatusRequest, UserResponse},
    },
    validation::{validate_ip_whitelist, validate_request},
};
use bulkline_db::repository::{
    credits::{self, LedgerOutcome},
    security, services, users,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    middleware::{require_admin, AuthContext},
    routes, AppState,
};

/// Largest single manual adjustment, in either direction.
const MAX_ADJUSTMENT: i64 = 10_000_000;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{user_id}", patch(update_user))
        .route("/admin/security", get(get_security).put(update_security))
        .route("/admin/credits/adjust", post(adjust_credits))
        .route("/admin/services", get(list_services).post(create_service))
        .route("/admin/activation-requests", get(list_activation_requests))
        .route(
            "/admin/activation-requests/{request_id}/review",
            post(review_activation_request),
        )
        .route("/admin/analytics", get(platform_analytics))
        .route("/admin/performance", get(performance))
        .route("/admin/performance/evict", post(evict_cache))
        .route("/admin/performance/clear", post(clear_cache))
        // Layers run bottom-up: authenticate first, then check the role.
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(q): Query<routes::Pagination>,
) -> BulklineResult<Json<Vec<UserResponse>>> {
    let (limit, offset) = routes::page(q.limit, q.offset);
    let list = users::list_users(&state.db.pool, limit, offset).await?;
    Ok(Json(list.into_iter().map(UserResponse::from).collect()))
}

/// PATCH /api/v1/admin/users/{user_id}
async fn update_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateUserStatusRequest>,
) -> BulklineResult<Json<UserResponse>> {
    if user_id == auth.user_id && (body.is_active == Some(false) || body.role.is_some()) {
        return Err(BulklineError::validation(
            "Admins cannot deactivate or change the role of their own account",
        ));
    }

    let user = users::update_status(&state.db.pool, user_id, body.is_active, body.role)
        .await?
        .ok_or_else(|| BulklineError::not_found("User"))?;

    tracing::info!(admin_id = %auth.user_id, %user_id, is_active = user.is_active, role = user.role.as_str(), "User updated");

    Ok(Json(user.into()))
}

/// GET /api/v1/admin/security
async fn get_security(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<SecuritySettings>> {
    Ok(Json(security::get_or_create(&state.db.pool, auth.user_id).await?))
}

/// PUT /api/v1/admin/security
async fn update_security(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateSecuritySettingsRequest>,
) -> BulklineResult<Json<SecuritySettings>> {
    validate_request(&body)?;

    let whitelist: Option<Vec<String>> = body.ip_whitelist.map(|list| {
        list.iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    });
    if let Some(list) = &whitelist {
        validate_ip_whitelist(list)?;
    }

    security::get_or_create(&state.db.pool, auth.user_id).await?;
    let settings = security::update_settings(
        &state.db.pool,
        auth.user_id,
        body.two_factor_enabled,
        body.session_timeout_minutes,
        whitelist.as_deref(),
        body.login_alerts,
    )
    .await?;

    Ok(Json(settings))
}

/// POST /api/v1/admin/credits/adjust
async fn adjust_credits(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdjustCreditsRequest>,
) -> BulklineResult<Json<CreditTransaction>> {
    validate_request(&body)?;
    if body.amount == 0 || body.amount.abs() > MAX_ADJUSTMENT {
        return Err(BulklineError::validation(format!(
            "Adjustment must be non-zero and at most {MAX_ADJUSTMENT} credits either way"
        )));
    }

    users::find_by_id(&state.db.pool, body.user_id)
        .await?
        .ok_or_else(|| BulklineError::not_found("User"))?;

    let outcome = credits::apply_transaction(
        &state.db.pool,
        body.user_id,
        body.amount,
        TransactionKind::Adjustment,
        body.description.trim(),
        Some(&format!("admin:{}", auth.user_id)),
    )
    .await?;

    let entry = match outcome {
        LedgerOutcome::Applied(entry) => entry,
        LedgerOutcome::Insufficient { available } => {
            return Err(BulklineError::InsufficientCredits {
                required: -body.amount,
                available,
            })
        }
    };

    routes::invalidate_tenant_cache(&state.perf, body.user_id);
    tracing::info!(
        admin_id = %auth.user_id,
        user_id = %body.user_id,
        amount = body.amount,
        balance = entry.balance_after,
        "Credits adjusted"
    );

    Ok(Json(entry))
}

/// GET /api/v1/admin/services — includes inactive services.
async fn list_services(State(state): State<Arc<AppState>>) -> BulklineResult<Json<Vec<Service>>> {
    Ok(Json(services::list_services(&state.db.pool, false).await?))
}

/// POST /api/v1/admin/services
async fn create_service(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateServiceRequest>,
) -> BulklineResult<Json<Service>> {
    validate_request(&body)?;

    let code = body.code.trim().to_ascii_lowercase();
    let service = services::create_service(
        &state.db.pool,
        ids::generate_id(),
        &code,
        body.name.trim(),
        body.description.as_deref(),
        body.category,
        body.monthly_price,
    )
    .await
    .map_err(|e| {
        let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
        if duplicate {
            BulklineError::AlreadyExists {
                resource: format!("Service '{code}'"),
            }
        } else {
            BulklineError::from(e)
        }
    })?;

    state.perf.cache.remove(routes::services::CATALOG_CACHE_KEY);
    Ok(Json(service))
}

/// GET /api/v1/admin/activation-requests?status=pending
async fn list_activation_requests(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ActivationQuery>,
) -> BulklineResult<Json<Vec<ServiceActivationRequest>>> {
    Ok(Json(services::list_requests(&state.db.pool, q.status).await?))
}

/// POST /api/v1/admin/activation-requests/{request_id}/review
///
/// Approval activates the subscription; rejection just records the decision.
async fn review_activation_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<ReviewActivationRequest>,
) -> BulklineResult<Json<ServiceActivationRequest>> {
    validate_request(&body)?;

    let status = if body.approve {
        ActivationStatus::Approved
    } else {
        ActivationStatus::Rejected
    };

    let request = services::review_request(
        &state.db.pool,
        request_id,
        auth.user_id,
        status,
        body.admin_notes.as_deref(),
    )
    .await?
    .ok_or_else(|| BulklineError::Conflict {
        message: "Activation request not found or already reviewed".into(),
    })?;

    if body.approve {
        services::activate_subscription(
            &state.db.pool,
            ids::generate_id(),
            request.user_id,
            request.service_id,
        )
        .await?;
    }

    tracing::info!(admin_id = %auth.user_id, %request_id, approved = body.approve, "Activation request reviewed");
    Ok(Json(request))
}

/// GET /api/v1/admin/analytics
async fn platform_analytics(
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<PlatformSummary>> {
    Ok(Json(routes::analytics::platform_summary(&state.db.pool).await?))
}

/// GET /api/v1/admin/performance
async fn performance(State(state): State<Arc<AppState>>) -> Json<PerformanceSnapshot> {
    Json(state.perf.snapshot())
}

/// POST /api/v1/admin/performance/evict
async fn evict_cache(State(state): State<Arc<AppState>>) -> Json<EvictionReport> {
    let report = state.perf.evict();
    tracing::info!(evicted = report.evicted.len(), "Manual cache eviction");
    Json(report)
}

/// POST /api/v1/admin/performance/clear
async fn clear_cache(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ClearOptions>>,
) -> Json<ClearReport> {
    let options = body.map(|Json(o)| o).unwrap_or_default();
    let report = state.perf.selective_clear(options);
    tracing::info!(
        removed = report.cache_removed,
        preserved = report.cache_preserved,
        "Selective cache clear"
    );
    Json(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn unauthenticated_admin_calls_are_rejected() {
        let app: Router = Router::new()
            .route("/admin/ping", get(|| async { "pong" }))
            .route_layer(middleware::from_fn(require_admin))
            .route_layer(middleware::from_fn(crate::middleware::auth_middleware));

        let res = app
            .oneshot(Request::get("/admin/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
