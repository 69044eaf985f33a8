//! Import job routes.
//!
//! POST /api/v1/imports                 — create a job for an uploaded file
//! GET  /api/v1/imports                 — list the caller's jobs
//! GET  /api/v1/imports/{job_id}        — job status and row errors
//! POST /api/v1/imports/{job_id}/process — run a pending or failed job now

use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    ids,
    models::import_job::{CreateImportJobRequest, ImportFormat, ImportJob},
    validation::validate_request,
};
use bulkline_db::repository::import_jobs;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    import::{self, schema},
    middleware::AuthContext,
    routes, AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/imports", get(list_imports).post(create_import))
        .route("/imports/{job_id}", get(get_import))
        .route("/imports/{job_id}/process", post(process_import))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// Run an already-claimed job inline and return its final row.
async fn run_claimed(state: &AppState, job: ImportJob) -> BulklineResult<ImportJob> {
    import::run_job(&state.db.pool, &state.data_dir, &state.imports, &job).await?;
    routes::invalidate_tenant_cache(&state.perf, job.user_id);

    import_jobs::find_by_id(&state.db.pool, job.id)
        .await?
        .ok_or_else(|| BulklineError::not_found("Import job"))
}

/// POST /api/v1/imports
async fn create_import(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateImportJobRequest>,
) -> BulklineResult<Json<ImportJob>> {
    validate_request(&body)?;
    schema::check_schema(body.target, &body.schema).map_err(BulklineError::validation)?;

    let format = body
        .format
        .or_else(|| ImportFormat::from_file_name(&body.file_name))
        .or_else(|| ImportFormat::from_file_name(&body.file_key))
        .ok_or_else(|| BulklineError::validation("Cannot tell the file format; pass 'format'"))?;

    let path = import::resolve_file_key(&state.data_dir, auth.user_id, &body.file_key)?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(BulklineError::validation("Uploaded file not found"));
    }

    let job = import_jobs::create_job(
        &state.db.pool,
        ids::generate_id(),
        auth.user_id,
        &body.file_key,
        body.file_name.trim(),
        format,
        body.target,
        &body.schema,
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, job_id = %job.id, target = ?job.target, "Import job created");

    if !body.process_now {
        return Ok(Json(job));
    }

    let claimed = import_jobs::claim_job(&state.db.pool, job.id, state.imports.stale_after)
        .await?
        .ok_or_else(|| BulklineError::Conflict {
            message: "Import job is already being processed".into(),
        })?;
    Ok(Json(run_claimed(&state, claimed).await?))
}

/// GET /api/v1/imports
async fn list_imports(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<routes::Pagination>,
) -> BulklineResult<Json<Vec<ImportJob>>> {
    let (limit, offset) = routes::page(q.limit, q.offset);
    let jobs = import_jobs::list_jobs(&state.db.pool, auth.user_id, limit, offset).await?;
    Ok(Json(jobs))
}

/// GET /api/v1/imports/{job_id}
async fn get_import(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> BulklineResult<Json<ImportJob>> {
    import_jobs::find_for_user(&state.db.pool, auth.user_id, job_id)
        .await?
        .map(Json)
        .ok_or_else(|| BulklineError::not_found("Import job"))
}

/// POST /api/v1/imports/{job_id}/process
async fn process_import(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> BulklineResult<Json<ImportJob>> {
    import_jobs::find_for_user(&state.db.pool, auth.user_id, job_id)
        .await?
        .ok_or_else(|| BulklineError::not_found("Import job"))?;

    let claimed = import_jobs::claim_job(&state.db.pool, job_id, state.imports.stale_after)
        .await?
        .ok_or_else(|| BulklineError::Conflict {
            message: "Import job is already being processed or has completed".into(),
        })?;

    Ok(Json(run_claimed(&state, claimed).await?))
}
