//! Import processing — parse an uploaded file, validate each row against the
//! job's schema, and insert the valid rows in batches.

pub mod parser;
pub mod processor;
pub mod schema;

use std::path::{Path, PathBuf};

use bulkline_common::error::BulklineError;
use uuid::Uuid;

pub use processor::{process_job, run_job, ImportOutcome, ImportStore, PgImportStore};

/// Storage key for a freshly uploaded file, relative to the data dir.
pub fn user_file_key(user_id: Uuid, file_id: Uuid, ext: &str) -> String {
    format!("imports/{user_id}/{file_id}.{ext}")
}

/// Resolve a client-supplied file key to a path, refusing keys outside the
/// caller's own upload directory.
pub fn resolve_file_key(
    data_dir: &Path,
    user_id: Uuid,
    key: &str,
) -> Result<PathBuf, BulklineError> {
    let prefix = format!("imports/{user_id}/");
    let rest = key.strip_prefix(&prefix).unwrap_or_default();

    let safe = !rest.is_empty()
        && !rest.contains('/')
        && !rest.contains('\\')
        && !rest.contains("..")
        && !rest.chars().any(char::is_control);

    if !safe {
        return Err(BulklineError::validation("Unknown file key"));
    }
    Ok(data_dir.join(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_keys_are_scoped_to_the_owner() {
        let dir = Path::new("/var/lib/bulkline");
        let me = Uuid::now_v7();
        let other = Uuid::now_v7();

        let key = user_file_key(me, Uuid::now_v7(), "csv");
        assert_eq!(resolve_file_key(dir, me, &key).unwrap(), dir.join(&key));

        assert!(resolve_file_key(dir, other, &key).is_err());
        assert!(resolve_file_key(dir, me, &format!("imports/{me}/../{other}/x.csv")).is_err());
        assert!(resolve_file_key(dir, me, &format!("imports/{me}/")).is_err());
        assert!(resolve_file_key(dir, me, "/etc/passwd").is_err());
    }
}
