//! Credential routes — the tenant's SMS-gateway login and platform API keys.
//!
//! The gateway API key is write-only from the client's point of view: reads
//! return a masked hint. Platform API keys are shown in full exactly once,
//! in the response that creates them.

use axum::{
    extract::{Extension, Path, State},
    middleware,
    routing::{delete, get},
    Json, Router,
};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    ids,
    models::credential::{
        ApiCredential, CreateApiCredentialRequest, GatewayCredentialResponse,
        SaveGatewayCredentialRequest,
    },
    validation::validate_request,
};
use bulkline_db::repository::credentials;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{auth, middleware::AuthContext, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/credentials/gateway",
            get(get_gateway).put(save_gateway).delete(delete_gateway),
        )
        .route("/credentials/api-keys", get(list_api_keys).post(create_api_key))
        .route("/credentials/api-keys/{key_id}", delete(revoke_api_key))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// GET /api/v1/credentials/gateway
async fn get_gateway(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<GatewayCredentialResponse>> {
    credentials::get_gateway_credential(&state.db.pool, auth.user_id)
        .await?
        .map(|c| Json(c.into()))
        .ok_or_else(|| BulklineError::not_found("Gateway credentials"))
}

/// PUT /api/v1/credentials/gateway
async fn save_gateway(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SaveGatewayCredentialRequest>,
) -> BulklineResult<Json<GatewayCredentialResponse>> {
    validate_request(&body)?;

    let saved = credentials::upsert_gateway_credential(
        &state.db.pool,
        auth.user_id,
        body.username.trim(),
        body.api_key.trim(),
        body.sender_id.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        body.is_reseller,
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, reseller = saved.is_reseller, "Gateway credentials saved");
    Ok(Json(saved.into()))
}

/// DELETE /api/v1/credentials/gateway
async fn delete_gateway(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<serde_json::Value>> {
    if !credentials::delete_gateway_credential(&state.db.pool, auth.user_id).await? {
        return Err(BulklineError::not_found("Gateway credentials"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// GET /api/v1/credentials/api-keys
async fn list_api_keys(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<Vec<ApiCredential>>> {
    Ok(Json(
        credentials::list_api_credentials(&state.db.pool, auth.user_id).await?,
    ))
}

#[derive(Serialize)]
struct CreatedApiKey {
    #[serde(flatten)]
    credential: ApiCredential,
    /// Full key. Not retrievable again.
    key: String,
}

/// POST /api/v1/credentials/api-keys
async fn create_api_key(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateApiCredentialRequest>,
) -> BulklineResult<Json<CreatedApiKey>> {
    validate_request(&body)?;

    let generated = auth::generate_api_key();
    let credential = credentials::create_api_credential(
        &state.db.pool,
        ids::generate_id(),
        auth.user_id,
        body.name.trim(),
        &generated.prefix,
        &generated.hash,
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, key_id = %credential.id, "API key created");

    Ok(Json(CreatedApiKey {
        credential,
        key: generated.plaintext,
    }))
}

/// DELETE /api/v1/credentials/api-keys/{key_id}
async fn revoke_api_key(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<Uuid>,
) -> BulklineResult<Json<serde_json::Value>> {
    if !credentials::revoke_api_credential(&state.db.pool, auth.user_id, key_id).await? {
        return Err(BulklineError::not_found("API key"));
    }

    tracing::info!(user_id = %auth.user_id, %key_id, "API key revoked");
    Ok(Json(serde_json::json!({ "revoked": true })))
}
