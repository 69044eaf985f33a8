//! Import job execution.
//!
//! Rows are validated one by one; invalid rows are counted and reported but
//! never stop the job. Valid rows are flushed to the store in batches of
//! `batch_size`, with progress written after every batch. A failed insert
//! fails the job; batches already written stay written. Any other store
//! error after the claim also marks the job failed before it is returned.

use std::path::Path;

use async_trait::async_trait;
use bulkline_common::{
    ids,
    models::import_job::{ImportJob, ImportStatus, ImportTarget, RowError},
};
use bulkline_db::repository::{contacts, import_jobs};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    parser::{self, Row},
    schema,
};
use crate::ImportSettings;

/// A row that passed validation, with its 1-based row number.
#[derive(Debug, Clone)]
pub struct ValidRow {
    pub row: usize,
    pub data: Row,
}

/// Persistence used while running a job.
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn set_total(&self, job_id: Uuid, total: i32) -> anyhow::Result<()>;

    async fn insert_batch(&self, job: &ImportJob, rows: &[ValidRow]) -> anyhow::Result<()>;

    async fn update_progress(&self, job_id: Uuid, processed: i32, failed: i32)
        -> anyhow::Result<()>;

    async fn complete(
        &self,
        job_id: Uuid,
        processed: i32,
        failed: i32,
        errors: &[RowError],
    ) -> anyhow::Result<()>;

    async fn fail(
        &self,
        job_id: Uuid,
        message: &str,
        processed: i32,
        failed: i32,
        errors: &[RowError],
    ) -> anyhow::Result<()>;
}

/// Postgres-backed store. Contact jobs write to the address book, record
/// jobs to `import_records`.
pub struct PgImportStore {
    pub pool: PgPool,
}

fn text_field(row: &Row, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn set_total(&self, job_id: Uuid, total: i32) -> anyhow::Result<()> {
        import_jobs::set_total(&self.pool, job_id, total).await?;
        Ok(())
    }

    async fn insert_batch(&self, job: &ImportJob, rows: &[ValidRow]) -> anyhow::Result<()> {
        match job.target {
            ImportTarget::Contacts => {
                let batch: Vec<contacts::NewContact> = rows
                    .iter()
                    .filter_map(|r| {
                        Some(contacts::NewContact {
                            id: ids::generate_id(),
                            name: text_field(&r.data, "name")?,
                            phone: text_field(&r.data, "phone")?,
                            email: text_field(&r.data, "email"),
                            notes: text_field(&r.data, "notes"),
                        })
                    })
                    .collect();
                contacts::insert_many(&self.pool, job.user_id, &batch).await?;
            }
            ImportTarget::Records => {
                let batch: Vec<(Uuid, i32, Value)> = rows
                    .iter()
                    .map(|r| {
                        (
                            ids::generate_id(),
                            count(r.row),
                            Value::Object(r.data.clone()),
                        )
                    })
                    .collect();
                import_jobs::insert_records(&self.pool, job.id, job.user_id, &batch).await?;
            }
        }
        Ok(())
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        processed: i32,
        failed: i32,
    ) -> anyhow::Result<()> {
        import_jobs::update_progress(&self.pool, job_id, processed, failed).await?;
        Ok(())
    }

    async fn complete(
        &self,
        job_id: Uuid,
        processed: i32,
        failed: i32,
        errors: &[RowError],
    ) -> anyhow::Result<()> {
        import_jobs::mark_completed(&self.pool, job_id, processed, failed, errors).await?;
        Ok(())
    }

    async fn fail(
        &self,
        job_id: Uuid,
        message: &str,
        processed: i32,
        failed: i32,
        errors: &[RowError],
    ) -> anyhow::Result<()> {
        import_jobs::mark_failed(&self.pool, job_id, message, processed, failed, errors).await?;
        Ok(())
    }
}

/// Final counters of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    pub status: ImportStatus,
    pub error_message: Option<String>,
}

impl ImportOutcome {
    fn failed_early(message: String) -> Self {
        Self {
            total: 0,
            processed: 0,
            failed: 0,
            errors: Vec::new(),
            status: ImportStatus::Failed,
            error_message: Some(message),
        }
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Run a claimed job over the given file contents.
pub async fn process_job(
    store: &dyn ImportStore,
    job: &ImportJob,
    text: &str,
    settings: &ImportSettings,
) -> anyhow::Result<ImportOutcome> {
    let rows = match parser::parse(job.format, text) {
        Ok(rows) => rows,
        Err(e) => {
            let message = e.to_string();
            store.fail(job.id, &message, 0, 0, &[]).await?;
            return Ok(ImportOutcome::failed_early(message));
        }
    };

    let total = rows.len();
    if let Err(e) = store.set_total(job.id, count(total)).await {
        return Err(abort(store, job, e, 0, 0, &[]).await);
    }

    let batch_size = settings.batch_size.max(1);
    let mut errors: Vec<RowError> = Vec::new();
    let mut pending: Vec<ValidRow> = Vec::with_capacity(batch_size);
    let mut processed = 0usize;
    let mut failed = 0usize;

    let record_errors = |errors: &mut Vec<RowError>, new: Vec<RowError>| {
        let room = settings.max_row_errors.saturating_sub(errors.len());
        errors.extend(new.into_iter().take(room));
    };

    for (i, parsed) in rows.into_iter().enumerate() {
        let row_number = i + 1;

        let validated = parsed
            .map_err(|message| {
                vec![RowError {
                    row: row_number,
                    field: None,
                    message,
                }]
            })
            .and_then(|row| schema::validate_row(row_number, &row, &job.schema.0));

        match validated {
            Ok(data) => pending.push(ValidRow {
                row: row_number,
                data,
            }),
            Err(row_errors) => {
                failed += 1;
                record_errors(&mut errors, row_errors);
            }
        }

        if pending.len() >= batch_size {
            if let Err(e) = store.insert_batch(job, &pending).await {
                return fail_batch(store, job, e, processed, failed, errors, total).await;
            }
            processed += pending.len();
            pending.clear();
            if let Err(e) = store
                .update_progress(job.id, count(processed), count(failed))
                .await
            {
                return Err(abort(store, job, e, processed, failed, &errors).await);
            }
        }
    }

    if !pending.is_empty() {
        if let Err(e) = store.insert_batch(job, &pending).await {
            return fail_batch(store, job, e, processed, failed, errors, total).await;
        }
        processed += pending.len();
    }

    if let Err(e) = store
        .complete(job.id, count(processed), count(failed), &errors)
        .await
    {
        return Err(abort(store, job, e, processed, failed, &errors).await);
    }

    Ok(ImportOutcome {
        total,
        processed,
        failed,
        errors,
        status: ImportStatus::Completed,
        error_message: None,
    })
}

/// Mark the job failed after a bookkeeping error so it can be claimed again.
/// Returns the original error.
async fn abort(
    store: &dyn ImportStore,
    job: &ImportJob,
    cause: anyhow::Error,
    processed: usize,
    failed: usize,
    errors: &[RowError],
) -> anyhow::Error {
    tracing::error!(job_id = %job.id, processed, error = %cause, "Import job aborted");
    let message = format!("Import aborted after {processed} rows: {cause}");
    if let Err(e) = store
        .fail(job.id, &message, count(processed), count(failed), errors)
        .await
    {
        tracing::warn!(job_id = %job.id, error = %e, "Could not mark import job failed");
    }
    cause
}

async fn fail_batch(
    store: &dyn ImportStore,
    job: &ImportJob,
    cause: anyhow::Error,
    processed: usize,
    failed: usize,
    errors: Vec<RowError>,
    total: usize,
) -> anyhow::Result<ImportOutcome> {
    tracing::error!(job_id = %job.id, processed, error = %cause, "Import batch insert failed");
    let message = format!("Insert failed after {processed} rows: {cause}");
    store
        .fail(job.id, &message, count(processed), count(failed), &errors)
        .await?;

    Ok(ImportOutcome {
        total,
        processed,
        failed,
        errors,
        status: ImportStatus::Failed,
        error_message: Some(message),
    })
}

/// Load the job's file from disk and process it against Postgres.
pub async fn run_job(
    pool: &PgPool,
    data_dir: &Path,
    settings: &ImportSettings,
    job: &ImportJob,
) -> anyhow::Result<ImportOutcome> {
    let store = PgImportStore { pool: pool.clone() };
    let path = data_dir.join(&job.file_key);

    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(job_id = %job.id, path = %path.display(), error = %e, "Import file unreadable");
            let message = format!("Could not read import file: {e}");
            store.fail(job.id, &message, 0, 0, &[]).await?;
            return Ok(ImportOutcome::failed_early(message));
        }
    };

    let outcome = process_job(&store, job, &text, settings).await?;
    tracing::info!(
        job_id = %job.id,
        user_id = %job.user_id,
        total = outcome.total,
        processed = outcome.processed,
        failed = outcome.failed,
        status = ?outcome.status,
        "Import job finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkline_common::models::import_job::{FieldSpec, FieldType, ImportFormat};
    use chrono::Utc;
    use sqlx::types::Json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        inserted: Mutex<Vec<ValidRow>>,
        batches: Mutex<usize>,
        fail_on_batch: Option<usize>,
        fail_progress: bool,
        progress: Mutex<Vec<(i32, i32)>>,
        finished: Mutex<Option<(ImportStatus, Option<String>)>>,
    }

    #[async_trait]
    impl ImportStore for MemoryStore {
        async fn set_total(&self, _job_id: Uuid, _total: i32) -> anyhow::Result<()> {
            Ok(())
        }

        async fn insert_batch(&self, _job: &ImportJob, rows: &[ValidRow]) -> anyhow::Result<()> {
            let mut batches = self.batches.lock().unwrap();
            *batches += 1;
            if self.fail_on_batch == Some(*batches) {
                anyhow::bail!("connection reset");
            }
            self.inserted.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }

        async fn update_progress(
            &self,
            _job_id: Uuid,
            processed: i32,
            failed: i32,
        ) -> anyhow::Result<()> {
            if self.fail_progress {
                anyhow::bail!("progress write timed out");
            }
            self.progress.lock().unwrap().push((processed, failed));
            Ok(())
        }

        async fn complete(
            &self,
            _job_id: Uuid,
            _processed: i32,
            _failed: i32,
            _errors: &[RowError],
        ) -> anyhow::Result<()> {
            *self.finished.lock().unwrap() = Some((ImportStatus::Completed, None));
            Ok(())
        }

        async fn fail(
            &self,
            _job_id: Uuid,
            message: &str,
            _processed: i32,
            _failed: i32,
            _errors: &[RowError],
        ) -> anyhow::Result<()> {
            *self.finished.lock().unwrap() = Some((ImportStatus::Failed, Some(message.into())));
            Ok(())
        }
    }

    fn contact_job(format: ImportFormat) -> ImportJob {
        let now = Utc::now();
        ImportJob {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            file_key: "imports/x/y.csv".into(),
            file_name: "contacts.csv".into(),
            format,
            target: ImportTarget::Contacts,
            schema: Json(vec![
                FieldSpec {
                    field: "name".into(),
                    field_type: FieldType::String,
                    required: true,
                },
                FieldSpec {
                    field: "phone".into(),
                    field_type: FieldType::Phone,
                    required: true,
                },
            ]),
            status: ImportStatus::Processing,
            total_records: 0,
            processed_records: 0,
            failed_records: 0,
            errors: Json(Vec::new()),
            error_message: None,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn settings(batch_size: usize, max_row_errors: usize) -> ImportSettings {
        ImportSettings {
            batch_size,
            max_row_errors,
            stale_after: std::time::Duration::from_secs(900),
        }
    }

    #[tokio::test]
    async fn invalid_rows_are_counted_not_fatal() {
        let store = MemoryStore::default();
        let job = contact_job(ImportFormat::Csv);

        let outcome = process_job(
            &store,
            &job,
            "name,phone\nAlice,0712345678\nBob,123456",
            &settings(100, 50),
        )
        .await
        .unwrap();

        assert_eq!(outcome.status, ImportStatus::Completed);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors[0].row, 2);
        assert_eq!(outcome.errors[0].field.as_deref(), Some("phone"));

        let inserted = store.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].data["phone"], "+254712345678");
    }

    #[tokio::test]
    async fn batch_failure_keeps_earlier_batches() {
        let store = MemoryStore {
            fail_on_batch: Some(2),
            ..Default::default()
        };
        let job = contact_job(ImportFormat::Csv);
        let csv = "name,phone\nA,0711111111\nB,0722222222\nC,0733333333\n";

        let outcome = process_job(&store, &job, csv, &settings(1, 50)).await.unwrap();

        assert_eq!(outcome.status, ImportStatus::Failed);
        assert_eq!(outcome.processed, 1);
        assert_eq!(store.inserted.lock().unwrap().len(), 1);
        assert_eq!(*store.progress.lock().unwrap(), vec![(1, 0)]);

        let finished = store.finished.lock().unwrap().clone().unwrap();
        assert_eq!(finished.0, ImportStatus::Failed);
        assert!(finished.1.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn progress_write_failure_marks_the_job_failed() {
        let store = MemoryStore {
            fail_progress: true,
            ..Default::default()
        };
        let job = contact_job(ImportFormat::Csv);
        let csv = "name,phone\nA,0711111111\nB,0722222222\n";

        let result = process_job(&store, &job, csv, &settings(1, 50)).await;

        assert!(result.is_err());
        let (status, message) = store.finished.lock().unwrap().clone().unwrap();
        assert_eq!(status, ImportStatus::Failed);
        assert!(message.unwrap().contains("progress write timed out"));
        assert_eq!(store.inserted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn row_errors_are_capped() {
        let store = MemoryStore::default();
        let job = contact_job(ImportFormat::Json);
        let json = r#"[{"name":"A","phone":"1"},{"name":"B","phone":"2"},{"name":"C","phone":"0712345678"}]"#;

        let outcome = process_job(&store, &job, json, &settings(10, 1)).await.unwrap();

        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.processed, 1);
    }

    #[tokio::test]
    async fn unparseable_file_fails_the_job() {
        let store = MemoryStore::default();
        let job = contact_job(ImportFormat::Csv);

        let outcome = process_job(&store, &job, "name,name\n", &settings(10, 10))
            .await
            .unwrap();

        assert_eq!(outcome.status, ImportStatus::Failed);
        assert!(outcome.error_message.unwrap().contains("repeats column"));
        assert_eq!(*store.batches.lock().unwrap(), 0);
    }
}
