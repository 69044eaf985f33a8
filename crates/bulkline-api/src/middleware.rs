//! Middleware and extractors — authentication, admin gate, security headers,
//! request rate limiting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use bulkline_cache::PerformanceContext;
use bulkline_common::{error::BulklineError, models::user::UserRole};
use bulkline_db::repository::{credentials, users};

use crate::{auth, AppState};

/// Header carrying a platform API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication context extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: uuid::Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Decode an access token into an [`AuthContext`].
fn context_from_token(token: &str, secret: &str) -> Result<AuthContext, BulklineError> {
    let claims = auth::validate_token(token, secret).map_err(|_| BulklineError::InvalidToken)?;

    // Ensure it's an access token, not a refresh token
    if claims.token_type != auth::ACCESS_TOKEN {
        return Err(BulklineError::InvalidToken);
    }

    let user_id = claims
        .sub
        .parse::<uuid::Uuid>()
        .map_err(|_| BulklineError::InvalidToken)?;

    Ok(AuthContext {
        user_id,
        email: claims.email,
        role: claims.role,
    })
}

/// Extract and validate the JWT from the Authorization: Bearer <token> header.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, BulklineError> {
    let token = bearer_token(&request).ok_or(BulklineError::Unauthorized)?;

    let config = bulkline_common::config::get();
    let context = context_from_token(token, &config.auth.jwt_secret)?;
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Caller of a programmatic endpoint: either a bearer access token or a
/// platform API key in `X-Api-Key`.
#[derive(Debug, Clone)]
pub struct ApiCaller(pub AuthContext);

impl FromRequestParts<Arc<AppState>> for ApiCaller {
    type Rejection = BulklineError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        {
            let config = bulkline_common::config::get();
            return context_from_token(token, &config.auth.jwt_secret).map(Self);
        }

        let key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|k| k.starts_with(auth::API_KEY_PREFIX))
            .ok_or(BulklineError::Unauthorized)?;

        let credential = credentials::use_api_credential(&state.db.pool, &auth::hash_api_key(key))
            .await?
            .ok_or(BulklineError::InvalidToken)?;

        let user = users::find_by_id(&state.db.pool, credential.user_id)
            .await?
            .ok_or(BulklineError::InvalidToken)?;
        if !user.is_active {
            return Err(BulklineError::AccountDisabled);
        }

        tracing::debug!(user_id = %user.id, key_prefix = %credential.key_prefix, "API key authenticated");

        Ok(Self(AuthContext {
            user_id: user.id,
            email: user.email,
            role: user.role,
        }))
    }
}

/// Reject non-admins. Must run after [`auth_middleware`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, BulklineError> {
    let auth = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(BulklineError::Unauthorized)?;

    if !auth.is_admin() {
        tracing::warn!(user_id = %auth.user_id, path = %request.uri().path(), "Non-admin hit admin route");
        return Err(BulklineError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Security headers for a JSON-only API. Nothing served here is meant to be
/// framed or to load subresources.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    const HEADERS: &[(&str, &str)] = &[
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("referrer-policy", "strict-origin-when-cross-origin"),
        ("strict-transport-security", "max-age=63072000; includeSubDomains"),
        ("content-security-policy", "default-src 'none'; frame-ancestors 'none'"),
        ("cache-control", "no-store"),
    ];

    for &(name, value) in HEADERS {
        h.insert(
            header::HeaderName::from_static(name),
            header::HeaderValue::from_static(value),
        );
    }

    response
}

// ── Rate limiting ─────────────────────────────────────────────────────────────

/// Identify the caller: the token subject when a valid bearer token is
/// present, otherwise the client address.
fn request_identifier(request: &Request) -> String {
    if let (Some(token), Some(config)) = (bearer_token(request), bulkline_common::config::try_get())
    {
        if let Ok(claims) = auth::validate_token(token, &config.auth.jwt_secret) {
            return format!("user:{}", claims.sub);
        }
    }

    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return format!("ip:{ip}");
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

/// Count the request against the caller's window and record its latency.
pub async fn rate_limit(
    State(perf): State<Arc<PerformanceContext>>,
    request: Request,
    next: Next,
) -> Result<Response, BulklineError> {
    let identifier = request_identifier(&request);

    if !perf.rate.track_request(&identifier) {
        let retry_after_ms =
            u64::try_from(perf.rate.retry_after().as_millis()).unwrap_or(u64::MAX);
        return Err(BulklineError::RateLimited { retry_after_ms });
    }

    let started = Instant::now();
    let response = next.run(request).await;
    perf.metrics.record_request(started.elapsed());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use bulkline_cache::PerformanceSettings;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(perf: Arc<PerformanceContext>) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(perf, rate_limit))
    }

    fn request_from(ip: &str) -> Request {
        Request::builder()
            .uri("/ping")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn throttles_after_limit() {
        let perf = Arc::new(PerformanceContext::new(PerformanceSettings {
            rate_limit: 2,
            ..PerformanceSettings::default()
        }));
        let app = app(perf.clone());

        for _ in 0..2 {
            let res = app.clone().oneshot(request_from("197.0.0.1")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app.clone().oneshot(request_from("197.0.0.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "RATE_LIMITED");
        assert!(json["retry_after_ms"].as_u64().unwrap() <= 60_000);

        // A different client still gets through.
        let res = app.oneshot(request_from("197.0.0.2")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        assert_eq!(perf.metrics.snapshot().requests_total, 3);
    }

    #[tokio::test]
    async fn admin_gate_rejects_clients() {
        let app = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn(require_admin));

        let mut req = Request::builder().uri("/admin").body(Body::empty()).unwrap();
        req.extensions_mut().insert(AuthContext {
            user_id: uuid::Uuid::now_v7(),
            email: "client@example.co.ke".into(),
            role: UserRole::Client,
        });
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let mut req = Request::builder().uri("/admin").body(Body::empty()).unwrap();
        req.extensions_mut().insert(AuthContext {
            user_id: uuid::Uuid::now_v7(),
            email: "ops@example.co.ke".into(),
            role: UserRole::Admin,
        });
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn(security_headers));
        let req = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        assert_eq!(res.headers()["x-frame-options"], "DENY");
        assert_eq!(res.headers()["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn missing_auth_context_is_unauthorized() {
        let app = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn(require_admin));
        let req = Request::builder().uri("/admin").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
