//! Import jobs — tracked bulk uploads of CSV/JSON data.
//!
//! Lifecycle: `pending → processing → completed | failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportJob {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Storage key returned by the upload endpoint
    pub file_key: String,
    pub file_name: String,
    pub format: ImportFormat,
    pub target: ImportTarget,
    pub schema: Json<Vec<FieldSpec>>,
    pub status: ImportStatus,
    pub total_records: i32,
    /// Rows that passed validation and were inserted
    pub processed_records: i32,
    /// Rows rejected by validation
    pub failed_records: i32,
    pub errors: Json<Vec<RowError>>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    Csv,
    Json,
}

impl ImportFormat {
    /// Guess the format from a file name extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Where validated rows end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImportTarget {
    /// Rows become address-book contacts (`name`, `phone`, optional `email`/`notes`)
    Contacts,
    /// Rows are stored verbatim as JSON in `import_records`
    Records,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Declared type of an import column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Number,
    Email,
    Phone,
    Date,
    String,
}

/// One column of a user-defined import schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

/// Validation failure for a single data row (1-based, header excluded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateImportJobRequest {
    #[validate(length(min = 1, max = 512))]
    pub file_key: String,

    #[validate(length(min = 1, max = 255))]
    pub file_name: String,

    /// Defaults to the file name extension
    pub format: Option<ImportFormat>,

    pub target: ImportTarget,

    #[validate(length(min = 1, max = 100, message = "Schema must declare 1-100 fields"))]
    pub schema: Vec<FieldSpec>,

    /// Run immediately instead of waiting for the poller
    #[serde(default)]
    pub process_now: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(ImportFormat::from_file_name("contacts.CSV"), Some(ImportFormat::Csv));
        assert_eq!(ImportFormat::from_file_name("dump.json"), Some(ImportFormat::Json));
        assert_eq!(ImportFormat::from_file_name("notes.txt"), None);
        assert_eq!(ImportFormat::from_file_name("no_extension"), None);
    }

    #[test]
    fn field_spec_uses_type_key() {
        let spec: FieldSpec =
            serde_json::from_str(r#"{"field":"phone","type":"phone","required":true}"#).unwrap();
        assert_eq!(spec.field_type, FieldType::Phone);
        assert!(spec.required);

        let optional: FieldSpec = serde_json::from_str(r#"{"field":"dob","type":"date"}"#).unwrap();
        assert!(!optional.required);
    }
}
