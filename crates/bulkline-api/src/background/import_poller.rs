//! Import poller — picks up pending import jobs and runs them.
//!
//! Each tick claims at most one job with `FOR UPDATE SKIP LOCKED`, so
//! several server instances can poll the same database. Jobs left in
//! `processing` by a dead worker are picked up again once they go stale. Database errors
//! back off exponentially until the next success.

use std::sync::Arc;
use std::time::Duration;

use bulkline_cache::backoff::backoff_delay;
use bulkline_db::repository::import_jobs;
use tokio_util::sync::CancellationToken;

use crate::{import, routes, AppState};

/// Delay before polling again after `failures` consecutive errors.
fn retry_delay(failures: u32, every: Duration) -> Duration {
    if failures == 0 {
        return every;
    }
    backoff_delay(failures - 1).max(every)
}

/// Claim and run the oldest runnable job, if any. Returns whether one ran.
async fn tick(state: &AppState) -> anyhow::Result<bool> {
    let Some(job) =
        import_jobs::claim_next_pending(&state.db.pool, state.imports.stale_after).await?
    else {
        return Ok(false);
    };

    tracing::info!(job_id = %job.id, user_id = %job.user_id, "Import job claimed");
    import::run_job(&state.db.pool, &state.data_dir, &state.imports, &job).await?;
    routes::invalidate_tenant_cache(&state.perf, job.user_id);
    Ok(true)
}

pub async fn run(state: Arc<AppState>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Import poller started");

    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Import poller stopping");
                break;
            }
            _ = tokio::time::sleep(retry_delay(failures, every)) => {
                match tick(&state).await {
                    Ok(ran) => {
                        failures = 0;
                        if !ran {
                            tracing::trace!("No pending import jobs");
                        }
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        tracing::warn!(error = %e, failures, "Import poller tick failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkline_cache::backoff::MAX_DELAY_MS;

    #[test]
    fn delay_grows_with_failures_and_is_capped() {
        let every = Duration::from_secs(5);
        assert_eq!(retry_delay(0, every), every);

        // 1s base (+ jitter) is shorter than the interval, so the interval wins.
        assert_eq!(retry_delay(1, every), every);

        let later = retry_delay(4, every);
        assert!(later >= Duration::from_secs(16));
        assert!(retry_delay(20, every) <= Duration::from_millis(MAX_DELAY_MS));
    }
}
