//! Current-user routes — profile and UI preferences.
//!
//! Preferences are small string flags kept in the performance context's
//! storage areas under `prefs:{user_id}:{key}`. `local` survives until an
//! admin clear; `session` is meant for per-login flags. Neither is persisted
//! across restarts.

use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{get, put},
    Json, Router,
};
use bulkline_cache::StorageArea;
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    models::user::{UpdateProfileRequest, UserResponse},
    validation::{require_kenyan_phone, validate_name, validate_request},
};
use bulkline_db::repository::users;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{middleware::AuthContext, AppState};

const MAX_PREFERENCE_KEY: usize = 64;
const MAX_PREFERENCE_VALUE: usize = 1024;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_current_user).patch(update_current_user))
        .route("/me/preferences", get(list_preferences))
        .route(
            "/me/preferences/{key}",
            put(set_preference).delete(delete_preference),
        )
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// GET /api/v1/me
async fn get_current_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<UserResponse>> {
    let user = users::find_by_id(&state.db.pool, auth.user_id)
        .await?
        .ok_or_else(|| BulklineError::not_found("User"))?;

    Ok(Json(user.into()))
}

/// PATCH /api/v1/me
async fn update_current_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateProfileRequest>,
) -> BulklineResult<Json<UserResponse>> {
    validate_request(&body)?;
    if let Some(ref name) = body.full_name {
        validate_name(name)?;
    }

    let phone = body
        .phone
        .as_deref()
        .map(require_kenyan_phone)
        .transpose()?;

    let user = users::update_profile(
        &state.db.pool,
        auth.user_id,
        body.full_name.as_deref().map(str::trim),
        body.company_name.as_deref().map(str::trim),
        phone.as_deref(),
    )
    .await?;

    Ok(Json(user.into()))
}

// ── Preferences ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceScope {
    #[default]
    Local,
    Session,
}

#[derive(Debug, Default, Deserialize)]
struct ScopeQuery {
    #[serde(default)]
    scope: PreferenceScope,
}

#[derive(Debug, Deserialize)]
struct SetPreferenceRequest {
    value: String,
    #[serde(default)]
    scope: PreferenceScope,
}

#[derive(Debug, Serialize)]
struct PreferencesResponse {
    scope: PreferenceScope,
    preferences: BTreeMap<String, String>,
}

fn area(state: &AppState, scope: PreferenceScope) -> &StorageArea {
    match scope {
        PreferenceScope::Local => &state.perf.local,
        PreferenceScope::Session => &state.perf.session,
    }
}

fn preference_prefix(user_id: uuid::Uuid) -> String {
    format!("prefs:{user_id}:")
}

fn check_key(key: &str) -> BulklineResult<()> {
    let ok = !key.is_empty()
        && key.len() <= MAX_PREFERENCE_KEY
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(BulklineError::validation(
            "Preference keys are 1-64 characters of letters, digits, '_', '-' or '.'",
        ))
    }
}

/// GET /api/v1/me/preferences?scope=local|session
async fn list_preferences(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopeQuery>,
) -> Json<PreferencesResponse> {
    let prefix = preference_prefix(auth.user_id);
    let preferences = area(&state, query.scope)
        .scan_prefix(&prefix)
        .into_iter()
        .map(|(k, v)| (k[prefix.len()..].to_string(), v))
        .collect();

    Json(PreferencesResponse {
        scope: query.scope,
        preferences,
    })
}

/// PUT /api/v1/me/preferences/{key}
async fn set_preference(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(body): Json<SetPreferenceRequest>,
) -> BulklineResult<Json<serde_json::Value>> {
    check_key(&key)?;
    if body.value.len() > MAX_PREFERENCE_VALUE {
        return Err(BulklineError::validation(
            "Preference values are limited to 1024 bytes",
        ));
    }

    area(&state, body.scope).set(
        format!("{}{key}", preference_prefix(auth.user_id)),
        body.value.clone(),
    );

    Ok(Json(serde_json::json!({ "key": key, "value": body.value, "scope": body.scope })))
}

/// DELETE /api/v1/me/preferences/{key}?scope=local|session
async fn delete_preference(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> BulklineResult<Json<serde_json::Value>> {
    check_key(&key)?;
    let removed = area(&state, query.scope)
        .remove(&format!("{}{key}", preference_prefix(auth.user_id)))
        .is_some();

    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_keys_are_restricted() {
        assert!(check_key("webp_supported").is_ok());
        assert!(check_key("sidebar.collapsed").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("a:b").is_err());
        assert!(check_key(&"k".repeat(65)).is_err());
    }

    #[test]
    fn scope_defaults_to_local() {
        let q: SetPreferenceRequest = serde_json::from_str(r#"{"value":"1"}"#).unwrap();
        assert_eq!(q.scope, PreferenceScope::Local);
        let q: SetPreferenceRequest =
            serde_json::from_str(r#"{"value":"1","scope":"session"}"#).unwrap();
        assert_eq!(q.scope, PreferenceScope::Session);
    }
}
