//! Service routes — catalog, subscriptions, activation requests.
//!
//! Clients never subscribe directly: they file an activation request and an
//! admin approval creates the subscription (see `routes::admin`).

use axum::{
    extract::{Extension, Path, State},
    middleware,
    routing::{delete, get},
    Json, Router,
};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    ids,
    models::service::{
        CreateActivationRequest, Service, ServiceActivationRequest, ServiceSubscription,
        SubscriptionStatus,
    },
    validation::validate_request,
};
use bulkline_db::repository::services;
use std::sync::Arc;
use uuid::Uuid;

use crate::{middleware::AuthContext, AppState};

pub const CATALOG_CACHE_KEY: &str = "services:catalog";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/services", get(list_catalog))
        .route("/services/subscriptions", get(list_subscriptions))
        .route("/services/{service_id}/subscription", delete(unsubscribe))
        .route(
            "/services/activation-requests",
            get(list_my_requests).post(request_activation),
        )
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// Active catalog, served from the performance cache when warm.
pub(crate) async fn catalog(state: &AppState) -> BulklineResult<Vec<Service>> {
    Ok(state
        .perf
        .read_through(CATALOG_CACHE_KEY, || services::list_services(&state.db.pool, true))
        .await?)
}

/// GET /api/v1/services
async fn list_catalog(State(state): State<Arc<AppState>>) -> BulklineResult<Json<Vec<Service>>> {
    Ok(Json(catalog(&state).await?))
}

/// GET /api/v1/services/subscriptions
async fn list_subscriptions(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<Vec<ServiceSubscription>>> {
    Ok(Json(
        services::list_subscriptions(&state.db.pool, auth.user_id).await?,
    ))
}

/// DELETE /api/v1/services/{service_id}/subscription
async fn unsubscribe(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<Uuid>,
) -> BulklineResult<Json<ServiceSubscription>> {
    let subscription = services::cancel_subscription(&state.db.pool, auth.user_id, service_id)
        .await?
        .ok_or_else(|| BulklineError::not_found("Subscription"))?;

    tracing::info!(user_id = %auth.user_id, %service_id, "Subscription cancelled");
    Ok(Json(subscription))
}

/// GET /api/v1/services/activation-requests
async fn list_my_requests(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<Vec<ServiceActivationRequest>>> {
    Ok(Json(
        services::list_user_requests(&state.db.pool, auth.user_id).await?,
    ))
}

/// POST /api/v1/services/activation-requests
async fn request_activation(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateActivationRequest>,
) -> BulklineResult<Json<ServiceActivationRequest>> {
    validate_request(&body)?;
    let pool = &state.db.pool;

    let service = services::find_service(pool, body.service_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| BulklineError::not_found("Service"))?;

    let already_active = services::list_subscriptions(pool, auth.user_id)
        .await?
        .iter()
        .any(|s| s.service_id == service.id && s.status == SubscriptionStatus::Active);
    if already_active {
        return Err(BulklineError::AlreadyExists {
            resource: "Subscription".into(),
        });
    }

    if services::has_pending_request(pool, auth.user_id, service.id).await? {
        return Err(BulklineError::AlreadyExists {
            resource: "Pending activation request".into(),
        });
    }

    let request = services::create_activation_request(
        pool,
        ids::generate_id(),
        auth.user_id,
        service.id,
        body.notes.as_deref(),
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, service = %service.code, "Activation requested");
    Ok(Json(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkline_common::models::service::ServiceCategory;
    use chrono::Utc;

    fn sms_service() -> Service {
        let now = Utc::now();
        Service {
            id: Uuid::now_v7(),
            code: "bulk_sms".into(),
            name: "Bulk SMS".into(),
            description: None,
            category: ServiceCategory::Sms,
            monthly_price: 500,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn warm_catalog_is_served_from_cache() {
        let state = Arc::new(crate::test_state());
        state.perf.store(CATALOG_CACHE_KEY, &vec![sms_service()]);

        let Json(list) = list_catalog(State(state.clone())).await.unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].code, "bulk_sms");
        let snap = state.perf.snapshot();
        assert_eq!(snap.metrics.cache_hits, 1);
        assert_eq!(snap.active_entries, 0);
    }
}
