//! # Bulkline Server
//!
//! Main binary. `serve` runs in one process:
//! - REST API (HTTP) for the client and admin portals
//! - cache maintenance (eviction, rate window, throughput sampling)
//! - the import poller
//!
//! `migrate` and `process-import` are one-shot operator commands.

use bulkline_api::{background, build_router, import, AppState, ImportSettings};
use bulkline_cache::{maintenance, PerformanceContext, PerformanceSettings};
use bulkline_common::config::AppConfig;
use bulkline_db::{repository::import_jobs, Database};
use bulkline_gateway::GatewayClient;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "bulkline", version, about = "Bulkline messaging platform server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations, then serve the API and background tasks (default)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Process one import job now, regardless of the poller
    ProcessImport {
        /// Import job id
        job_id: Uuid,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bulkline=debug,tower_http=debug".into());

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }
}

fn performance_settings(config: &AppConfig) -> PerformanceSettings {
    PerformanceSettings {
        large_entry_bytes: config.cache.large_entry_bytes,
        stale_after: config.cache.stale_after(),
        recent_window: config.cache.recent_window(),
        rate_limit: config.cache.rate_limit_per_window,
        rate_window: config.cache.rate_window(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = bulkline_common::config::init()?;
    init_tracing(config);

    let db = Database::connect(config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => db.migrate().await,
        Command::ProcessImport { job_id } => process_import(config, &db, job_id).await,
        Command::Serve => {
            db.migrate().await?;
            serve(config, db).await
        }
    }
}

async fn process_import(config: &AppConfig, db: &Database, job_id: Uuid) -> anyhow::Result<()> {
    let settings = ImportSettings::from(&config.imports);
    let job = import_jobs::claim_job(&db.pool, job_id, settings.stale_after)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Import job {job_id} not found or already processing"))?;

    let outcome = import::run_job(
        &db.pool,
        &PathBuf::from(&config.storage.data_dir),
        &settings,
        &job,
    )
    .await?;

    tracing::info!(
        %job_id,
        status = ?outcome.status,
        processed = outcome.processed,
        failed = outcome.failed,
        "Import finished"
    );
    Ok(())
}

async fn serve(config: &AppConfig, db: Database) -> anyhow::Result<()> {
    tracing::info!("Starting Bulkline v{}", env!("CARGO_PKG_VERSION"));

    let gateway = GatewayClient::new(
        &config.gateway.base_url,
        Duration::from_secs(config.gateway.timeout_secs),
    )?;
    tracing::info!(base_url = %config.gateway.base_url, "SMS gateway client ready");

    let data_dir = PathBuf::from(&config.storage.data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    let perf = Arc::new(PerformanceContext::new(performance_settings(config)));

    let state = AppState {
        db,
        gateway,
        perf: perf.clone(),
        imports: ImportSettings::from(&config.imports),
        data_dir,
        max_upload_bytes: config.storage.max_upload_bytes,
    };

    let cancel = CancellationToken::new();

    let maintenance_handle = tokio::spawn(maintenance::run(
        perf,
        config.cache.maintenance_interval(),
        cancel.clone(),
    ));
    let poller_handle = tokio::spawn(background::import_poller::run(
        Arc::new(state.clone()),
        Duration::from_secs(config.imports.poll_interval_secs.max(1)),
        cancel.clone(),
    ));

    let app = build_router(state);
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped accepting connections, stopping background tasks");
    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), maintenance_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(30), poller_handle).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
