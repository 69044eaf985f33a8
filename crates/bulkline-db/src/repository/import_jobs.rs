//! Import job repository — job rows, progress tracking, and raw record storage.

use bulkline_common::models::import_job::{
    FieldSpec, ImportFormat, ImportJob, ImportTarget, RowError,
};
use sqlx::{types::Json, PgPool};
use std::time::Duration;
use uuid::Uuid;

pub async fn create_job(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    file_key: &str,
    file_name: &str,
    format: ImportFormat,
    target: ImportTarget,
    schema: &[FieldSpec],
) -> Result<ImportJob, sqlx::Error> {
    sqlx::query_as::<_, ImportJob>(
        r#"
        INSERT INTO import_jobs (id, user_id, file_key, file_name, format, target, schema,
                                 status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(file_key)
    .bind(file_name)
    .bind(format)
    .bind(target)
    .bind(Json(schema))
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ImportJob>, sqlx::Error> {
    sqlx::query_as::<_, ImportJob>("SELECT * FROM import_jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_for_user(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<ImportJob>, sqlx::Error> {
    sqlx::query_as::<_, ImportJob>("SELECT * FROM import_jobs WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_jobs(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<ImportJob>, sqlx::Error> {
    sqlx::query_as::<_, ImportJob>(
        "SELECT * FROM import_jobs WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

const CLAIM_NEXT_SQL: &str = r#"
    WITH claimed AS (
        UPDATE import_jobs SET
            status = 'processing',
            total_records = 0,
            processed_records = 0,
            failed_records = 0,
            errors = '[]',
            error_message = NULL,
            started_at = NOW(),
            completed_at = NULL,
            updated_at = NOW()
        WHERE id = (
            SELECT id FROM import_jobs
            WHERE status = 'pending'
               OR (status = 'processing' AND updated_at < NOW() - make_interval(secs => $1))
            ORDER BY created_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING *
    ),
    purged AS (
        DELETE FROM import_records WHERE job_id IN (SELECT id FROM claimed)
    )
    SELECT * FROM claimed
    "#;

const CLAIM_ONE_SQL: &str = r#"
    WITH claimed AS (
        UPDATE import_jobs SET
            status = 'processing',
            total_records = 0,
            processed_records = 0,
            failed_records = 0,
            errors = '[]',
            error_message = NULL,
            started_at = NOW(),
            completed_at = NULL,
            updated_at = NOW()
        WHERE id = $1
          AND (status IN ('pending', 'failed')
               OR (status = 'processing' AND updated_at < NOW() - make_interval(secs => $2)))
        RETURNING *
    ),
    purged AS (
        DELETE FROM import_records WHERE job_id IN (SELECT id FROM claimed)
    )
    SELECT * FROM claimed
    "#;

const INSERT_RECORDS_SQL: &str = r#"
    INSERT INTO import_records (id, job_id, user_id, row_number, data, created_at)
    SELECT t.id, $2, $3, t.row_number, t.data, NOW()
    FROM UNNEST($1::uuid[], $4::int4[], $5::jsonb[]) AS t(id, row_number, data)
    ON CONFLICT (job_id, row_number) DO NOTHING
    "#;

/// Atomically take the oldest runnable job and mark it `processing`.
///
/// Runnable means pending, or processing with no progress for `stale_after`
/// (its worker died mid-run). `SKIP LOCKED` keeps two pollers from claiming
/// the same row. The job restarts from scratch: counters are reset and raw
/// records written by an earlier attempt are removed.
pub async fn claim_next_pending(
    pool: &PgPool,
    stale_after: Duration,
) -> Result<Option<ImportJob>, sqlx::Error> {
    sqlx::query_as::<_, ImportJob>(CLAIM_NEXT_SQL)
    .bind(stale_after.as_secs_f64())
    .fetch_optional(pool)
    .await
}

/// Claim a specific job for processing. Pending and failed jobs, and
/// processing jobs idle for longer than `stale_after`, are (re-)run from
/// scratch: counters are reset and earlier raw records are removed.
pub async fn claim_job(
    pool: &PgPool,
    id: Uuid,
    stale_after: Duration,
) -> Result<Option<ImportJob>, sqlx::Error> {
    sqlx::query_as::<_, ImportJob>(CLAIM_ONE_SQL)
    .bind(id)
    .bind(stale_after.as_secs_f64())
    .fetch_optional(pool)
    .await
}

pub async fn set_total(pool: &PgPool, id: Uuid, total: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE import_jobs SET total_records = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(total)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_progress(
    pool: &PgPool,
    id: Uuid,
    processed: i32,
    failed: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE import_jobs SET
            processed_records = $2,
            failed_records = $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(processed)
    .bind(failed)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_completed(
    pool: &PgPool,
    id: Uuid,
    processed: i32,
    failed: i32,
    errors: &[RowError],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE import_jobs SET
            status = 'completed',
            processed_records = $2,
            failed_records = $3,
            errors = $4,
            completed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(processed)
    .bind(failed)
    .bind(Json(errors))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(
    pool: &PgPool,
    id: Uuid,
    message: &str,
    processed: i32,
    failed: i32,
    errors: &[RowError],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE import_jobs SET
            status = 'failed',
            error_message = $2,
            processed_records = $3,
            failed_records = $4,
            errors = $5,
            completed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(message)
    .bind(processed)
    .bind(failed)
    .bind(Json(errors))
    .execute(pool)
    .await?;
    Ok(())
}

/// Store validated rows verbatim. `rows` pairs the 1-based row number with its data.
pub async fn insert_records(
    pool: &PgPool,
    job_id: Uuid,
    user_id: Uuid,
    rows: &[(Uuid, i32, serde_json::Value)],
) -> Result<u64, sqlx::Error> {
    if rows.is_empty() {
        return Ok(0);
    }

    let ids: Vec<Uuid> = rows.iter().map(|(id, _, _)| *id).collect();
    let numbers: Vec<i32> = rows.iter().map(|(_, n, _)| *n).collect();
    let data: Vec<serde_json::Value> = rows.iter().map(|(_, _, d)| d.clone()).collect();

    let result = sqlx::query(INSERT_RECORDS_SQL)
    .bind(&ids)
    .bind(job_id)
    .bind(user_id)
    .bind(&numbers)
    .bind(&data)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_restart_from_scratch() {
        for sql in [CLAIM_NEXT_SQL, CLAIM_ONE_SQL] {
            assert!(sql.contains("processed_records = 0"));
            assert!(sql.contains("DELETE FROM import_records WHERE job_id IN (SELECT id FROM claimed)"));
            assert!(sql.contains("status = 'processing' AND updated_at < NOW() - make_interval"));
        }
        assert!(CLAIM_ONE_SQL.contains("status IN ('pending', 'failed')"));
        assert!(!CLAIM_NEXT_SQL.contains("'failed'"));
    }

    #[test]
    fn record_inserts_skip_rows_already_stored() {
        assert!(INSERT_RECORDS_SQL.contains("ON CONFLICT (job_id, row_number) DO NOTHING"));
    }
}
