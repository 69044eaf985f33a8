//! Authentication routes — register, login, refresh.
//!
//! Self-service registration always creates a client account. Admin accounts
//! are promoted through `PATCH /admin/users/{id}`.

use axum::{extract::State, routing::post, Json, Router};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    ids,
    models::user::{CreateUserRequest, LoginRequest, User, UserResponse, UserRole},
    validation::{require_kenyan_phone, validate_name, validate_request},
};
use bulkline_db::repository::{credits, users};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    auth::{self, TokenPair},
    AppState,
};

/// Auth router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
}

#[derive(Serialize)]
struct AuthResponse {
    user: UserResponse,
    #[serde(flatten)]
    tokens: TokenPair,
}

fn issue_tokens(user: &User) -> BulklineResult<TokenPair> {
    let config = bulkline_common::config::get();
    auth::generate_token_pair(
        user.id,
        &user.email,
        user.role,
        &config.auth.jwt_secret,
        config.auth.access_token_ttl_secs,
        config.auth.refresh_token_ttl_secs,
    )
    .map_err(|e| BulklineError::Internal(e.into()))
}

/// POST /api/v1/auth/register
///
/// Create a client account with an empty credit balance. Returns the profile
/// plus a token pair.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserRequest>,
) -> BulklineResult<Json<AuthResponse>> {
    validate_request(&body)?;
    validate_name(&body.full_name)?;

    let phone = body
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(require_kenyan_phone)
        .transpose()?;

    if users::find_by_email(&state.db.pool, &body.email)
        .await?
        .is_some()
    {
        return Err(BulklineError::AlreadyExists {
            resource: "Email".into(),
        });
    }

    let password_hash = auth::hash_password(&body.password)
        .map_err(|e| BulklineError::Internal(anyhow::anyhow!("{e}")))?;

    let user = users::create_user(
        &state.db.pool,
        ids::generate_id(),
        body.email.trim(),
        &password_hash,
        body.full_name.trim(),
        body.company_name.as_deref().map(str::trim),
        phone.as_deref(),
        UserRole::Client,
    )
    .await?;

    credits::ensure_account(&state.db.pool, user.id).await?;

    let tokens = issue_tokens(&user)?;

    tracing::info!(user_id = %user.id, "New client registered");

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> BulklineResult<Json<AuthResponse>> {
    validate_request(&body)?;

    let user = users::find_by_email(&state.db.pool, &body.email)
        .await?
        .ok_or(BulklineError::InvalidCredentials)?;

    let valid = auth::verify_password(&body.password, &user.password_hash)
        .map_err(|_| BulklineError::InvalidCredentials)?;
    if !valid {
        return Err(BulklineError::InvalidCredentials);
    }

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Login attempt on disabled account");
        return Err(BulklineError::AccountDisabled);
    }

    let tokens = issue_tokens(&user)?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User logged in");

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new token pair. The role is re-read from
/// the database so promotions and deactivations take effect here.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> BulklineResult<Json<TokenPair>> {
    let config = bulkline_common::config::get();

    let claims = auth::validate_token(&body.refresh_token, &config.auth.jwt_secret)
        .map_err(|_| BulklineError::InvalidToken)?;

    if claims.token_type != auth::REFRESH_TOKEN {
        return Err(BulklineError::InvalidToken);
    }

    let user_id: uuid::Uuid = claims.sub.parse().map_err(|_| BulklineError::InvalidToken)?;

    let user = users::find_by_id(&state.db.pool, user_id)
        .await?
        .ok_or(BulklineError::InvalidToken)?;

    if !user.is_active {
        return Err(BulklineError::AccountDisabled);
    }

    Ok(Json(issue_tokens(&user)?))
}
