//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG.get().expect("Config not initialized. Call bulkline_common::config::init() first.")
}

/// Get the global configuration if [`init`] has already run.
pub fn try_get() -> Option<&'static AppConfig> {
    CONFIG.get()
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 2)?
        .set_default("auth.access_token_ttl_secs", 900)? // 15 min
        .set_default("auth.refresh_token_ttl_secs", 2_592_000)? // 30 days
        .set_default("gateway.base_url", "https://api.smsgateway.co.ke")?
        .set_default("gateway.timeout_secs", 30)?
        .set_default("storage.data_dir", "./data/uploads")?
        .set_default("storage.max_upload_bytes", 20_971_520)? // 20MB
        .set_default("imports.batch_size", 100)?
        .set_default("imports.poll_interval_secs", 60)?
        .set_default("imports.max_row_errors", 100)?
        .set_default("imports.stale_after_secs", 900)?
        .set_default("cache.large_entry_bytes", 1_048_576)?
        .set_default("cache.stale_after_secs", 300)?
        .set_default("cache.recent_window_secs", 60)?
        .set_default("cache.maintenance_interval_secs", 30)?
        .set_default("cache.rate_limit_per_window", 500)?
        .set_default("cache.rate_window_secs", 60)?
        .set_default("logging.json", false)?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (BULKLINE_SERVER__PORT, BULKLINE_DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("BULKLINE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub imports: ImportConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret (HS256) — should be 256+ bits of entropy
    pub jwt_secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Root URL of the external SMS gateway, without trailing slash.
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Local directory where uploaded import files are kept.
    pub data_dir: String,
    pub max_upload_bytes: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Rows inserted per database round-trip.
    pub batch_size: usize,
    pub poll_interval_secs: u64,
    /// Per-row error messages kept on the job row.
    pub max_row_errors: usize,
    /// A processing job with no progress for this long is reclaimable.
    pub stale_after_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub large_entry_bytes: usize,
    pub stale_after_secs: u64,
    pub recent_window_secs: u64,
    pub maintenance_interval_secs: u64,
    pub rate_limit_per_window: u32,
    pub rate_window_secs: u64,
}

impl CacheConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn recent_window(&self) -> Duration {
        Duration::from_secs(self.recent_window_secs)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}
