//! # bulkline-api
//!
//! REST API layer for Bulkline. Serves both portals: client routes are
//! scoped to the authenticated tenant, `/admin/*` routes require the admin
//! role. Also owns import processing and the import poller.

pub mod auth;
pub mod background;
pub mod import;
pub mod middleware;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use bulkline_cache::PerformanceContext;
use bulkline_db::Database;
use bulkline_gateway::GatewayClient;

/// Knobs for import processing.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Rows handed to one insert statement
    pub batch_size: usize,
    /// Row errors kept on the job row
    pub max_row_errors: usize,
    /// Idle time after which a `processing` job may be claimed again
    pub stale_after: Duration,
}

impl From<&bulkline_common::config::ImportConfig> for ImportSettings {
    fn from(c: &bulkline_common::config::ImportConfig) -> Self {
        Self {
            batch_size: c.batch_size.max(1),
            max_row_errors: c.max_row_errors,
            stale_after: Duration::from_secs(c.stale_after_secs.max(1)),
        }
    }
}

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Client for the external SMS gateway, shared by campaign sends and the proxy function.
    pub gateway: GatewayClient,
    /// Process-local cache, storage areas, rate tracker and metrics.
    pub perf: Arc<PerformanceContext>,
    pub imports: ImportSettings,
    /// Root directory for uploaded import files.
    pub data_dir: PathBuf,
    pub max_upload_bytes: u64,
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let perf = state.perf.clone();
    let upload_limit = state.max_upload_bytes;

    let api_routes = Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::profile::router())
        .merge(routes::contacts::router())
        .merge(routes::campaigns::router())
        .merge(routes::credits::router())
        .merge(routes::services::router())
        .merge(routes::analytics::router())
        .merge(routes::credentials::router())
        .merge(routes::functions::router())
        .merge(routes::uploads::router(upload_limit))
        .merge(routes::imports::router())
        .merge(routes::admin::router());

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(axum::middleware::from_fn_with_state(perf, middleware::rate_limit))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(Arc::new(state))
}

/// State whose database pool never connects; handlers that stay on the
/// cache can be exercised without Postgres.
#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://bulkline@127.0.0.1:1/bulkline")
        .unwrap();
    AppState {
        db: Database { pool },
        gateway: GatewayClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap(),
        perf: Arc::new(PerformanceContext::new(
            bulkline_cache::PerformanceSettings::default(),
        )),
        imports: ImportSettings {
            batch_size: 100,
            max_row_errors: 100,
            stale_after: Duration::from_secs(900),
        },
        data_dir: std::env::temp_dir(),
        max_upload_bytes: 1024 * 1024,
    }
}
