//! Upload route — stores CSV/JSON files for later import.
//!
//! POST /api/v1/uploads — multipart/form-data with a `file` field.
//!
//! Files land at `{data_dir}/imports/{user_id}/{uuid}.{ext}`; the returned
//! `file_key` is that path relative to `data_dir` and is what
//! `POST /imports` expects.

use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, State},
    middleware,
    routing::post,
    Json, Router,
};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    ids,
    models::import_job::ImportFormat,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::{import, middleware::AuthContext, AppState};

/// Headroom for multipart framing on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(max_upload_bytes: u64) -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/uploads", post(upload_file))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    file_key: String,
    file_name: String,
    format: ImportFormat,
    content_type: String,
    size: u64,
    sha256: String,
}

/// Decide the import format from the file name, falling back to the
/// declared content type.
fn detect_format(file_name: &str, declared: Option<&str>) -> Option<ImportFormat> {
    ImportFormat::from_file_name(file_name).or_else(|| {
        let essence = declared?.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/csv" | "application/csv" => Some(ImportFormat::Csv),
            "application/json" => Some(ImportFormat::Json),
            _ => None,
        }
    })
}

fn extension(format: ImportFormat) -> &'static str {
    match format {
        ImportFormat::Csv => "csv",
        ImportFormat::Json => "json",
    }
}

/// Keep only the final path component and printable characters.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();
    if cleaned.trim().is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// POST /api/v1/uploads
async fn upload_file(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> BulklineResult<Json<UploadResponse>> {
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BulklineError::validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = sanitize_filename(field.file_name().unwrap_or("upload"));
        let declared = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| BulklineError::validation(format!("Failed to read file: {e}")))?;

        upload = Some((file_name, declared, bytes.to_vec()));
        break;
    }

    let (file_name, declared, data) =
        upload.ok_or_else(|| BulklineError::validation("No file field in request"))?;

    let format = detect_format(&file_name, declared.as_deref()).ok_or_else(|| {
        BulklineError::validation("Only CSV and JSON files can be imported")
    })?;

    let size = data.len() as u64;
    if size == 0 {
        return Err(BulklineError::validation("Uploaded file is empty"));
    }
    if size > state.max_upload_bytes {
        return Err(BulklineError::validation(format!(
            "File too large: {size} bytes (max {} bytes)",
            state.max_upload_bytes
        )));
    }

    let content_type = mime_guess::from_ext(extension(format))
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let sha256 = hex::encode(Sha256::digest(&data));

    let file_key = import::user_file_key(auth.user_id, ids::generate_id(), extension(format));
    let path = state.data_dir.join(&file_key);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BulklineError::Internal(e.into()))?;
    }
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| BulklineError::Internal(e.into()))?;

    tracing::info!(user_id = %auth.user_id, %file_key, size, "Import file uploaded");

    Ok(Json(UploadResponse {
        file_key,
        file_name,
        format,
        content_type,
        size,
        sha256,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_name_or_content_type() {
        assert_eq!(detect_format("contacts.csv", None), Some(ImportFormat::Csv));
        assert_eq!(detect_format("blob", Some("application/json; charset=utf-8")), Some(ImportFormat::Json));
        assert_eq!(detect_format("blob", Some("text/csv")), Some(ImportFormat::Csv));
        assert_eq!(detect_format("photo.png", Some("image/png")), None);
    }

    #[test]
    fn filenames_are_reduced_to_basename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\list.csv"), "list.csv");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn csv_content_type_is_guessed() {
        let ct = mime_guess::from_ext("csv").first_or_octet_stream();
        assert_eq!(ct.essence_str(), "text/csv");
    }
}
