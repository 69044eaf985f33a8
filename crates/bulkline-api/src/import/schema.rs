//! Row validation against a user-declared import schema.
//!
//! Only declared fields are kept. Values are normalized on the way through:
//! phones to `+254…`, emails lowercased, dates to `YYYY-MM-DD`, numbers to
//! JSON numbers. Blank optional fields become `null`.

use bulkline_common::{
    models::import_job::{FieldSpec, FieldType, ImportTarget, RowError},
    validation::{is_valid_email, normalize_kenyan_phone},
};
use chrono::{DateTime, NaiveDate};
use serde_json::{Number, Value};
use std::collections::HashSet;

use super::parser::Row;

/// Date layouts accepted for `date` fields, besides RFC 3339 timestamps.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Check a schema before a job is created.
pub fn check_schema(target: ImportTarget, schema: &[FieldSpec]) -> Result<(), String> {
    if schema.is_empty() {
        return Err("Schema must declare at least one field".into());
    }

    let mut seen = HashSet::new();
    for spec in schema {
        let name = spec.field.trim();
        if name.is_empty() {
            return Err("Schema field names cannot be empty".into());
        }
        if !seen.insert(name) {
            return Err(format!("Schema declares '{name}' more than once"));
        }
    }

    if target == ImportTarget::Contacts {
        let field = |n: &str| schema.iter().find(|s| s.field.trim() == n);
        match field("name") {
            Some(s) if s.required => {}
            _ => return Err("Contact imports need a required 'name' field".into()),
        }
        match field("phone") {
            Some(s) if s.required && s.field_type == FieldType::Phone => {}
            _ => {
                return Err("Contact imports need a required 'phone' field of type phone".into())
            }
        }
        if let Some(s) = field("email") {
            if s.field_type != FieldType::Email {
                return Err("Contact 'email' field must be of type email".into());
            }
        }
    }

    Ok(())
}

/// Scalar text of a raw value, or `None` for null. Compound values are rejected.
fn scalar_text(value: &Value) -> Result<Option<String>, &'static str> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err("must be a single value"),
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Validate and normalize one non-blank value.
pub fn normalize_value(field_type: FieldType, text: &str) -> Result<Value, String> {
    match field_type {
        FieldType::String => Ok(Value::String(text.to_string())),
        FieldType::Number => {
            parse_number(text).ok_or_else(|| format!("'{text}' is not a number"))
        }
        FieldType::Email => {
            if is_valid_email(text) {
                Ok(Value::String(text.to_lowercase()))
            } else {
                Err(format!("'{text}' is not a valid email address"))
            }
        }
        FieldType::Phone => normalize_kenyan_phone(text)
            .map(Value::String)
            .ok_or_else(|| format!("'{text}' is not a valid Kenyan phone number")),
        FieldType::Date => parse_date(text)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| format!("'{text}' is not a recognised date")),
    }
}

/// Validate a row. On failure every offending field is reported.
pub fn validate_row(row_number: usize, row: &Row, schema: &[FieldSpec]) -> Result<Row, Vec<RowError>> {
    let mut out = Row::new();
    let mut errors = Vec::new();

    for spec in schema {
        let name = spec.field.trim();
        let error = |message: String| RowError {
            row: row_number,
            field: Some(name.to_string()),
            message,
        };

        let text = match row.get(name).map(scalar_text).transpose() {
            Ok(t) => t.flatten().filter(|t| !t.is_empty()),
            Err(msg) => {
                errors.push(error(format!("'{name}' {msg}")));
                continue;
            }
        };

        match text {
            None if spec.required => errors.push(error(format!("'{name}' is required"))),
            None => {
                out.insert(name.to_string(), Value::Null);
            }
            Some(text) => match normalize_value(spec.field_type, &text) {
                Ok(value) => {
                    out.insert(name.to_string(), value);
                }
                Err(message) => errors.push(error(message)),
            },
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(field: &str, field_type: FieldType, required: bool) -> FieldSpec {
        FieldSpec {
            field: field.into(),
            field_type,
            required,
        }
    }

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn normalizes_each_type() {
        assert_eq!(normalize_value(FieldType::Number, "42").unwrap(), json!(42));
        assert_eq!(normalize_value(FieldType::Number, "2.5").unwrap(), json!(2.5));
        assert!(normalize_value(FieldType::Number, "abc").is_err());
        assert_eq!(
            normalize_value(FieldType::Email, "Wanjiru@Example.co.ke").unwrap(),
            json!("wanjiru@example.co.ke")
        );
        assert!(normalize_value(FieldType::Email, "not-an-email").is_err());
        assert_eq!(
            normalize_value(FieldType::Phone, "0712345678").unwrap(),
            json!("+254712345678")
        );
        assert!(normalize_value(FieldType::Phone, "123456").is_err());
        assert_eq!(normalize_value(FieldType::Date, "31/01/2024").unwrap(), json!("2024-01-31"));
        assert_eq!(
            normalize_value(FieldType::Date, "2024-03-05T10:00:00+03:00").unwrap(),
            json!("2024-03-05")
        );
        assert!(normalize_value(FieldType::Date, "yesterday").is_err());
    }

    #[test]
    fn required_blank_fails_optional_blank_is_null() {
        let schema = [
            spec("name", FieldType::String, true),
            spec("email", FieldType::Email, false),
        ];

        let ok = validate_row(1, &row(json!({"name": "Alice", "email": " "})), &schema).unwrap();
        assert_eq!(ok["email"], Value::Null);

        let errs = validate_row(2, &row(json!({"name": "", "email": "x"})), &schema).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].row, 2);
        assert_eq!(errs[0].field.as_deref(), Some("name"));
    }

    #[test]
    fn undeclared_columns_are_dropped() {
        let schema = [spec("age", FieldType::Number, false)];
        let out = validate_row(1, &row(json!({"age": 30, "extra": "x"})), &schema).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["age"], 30);
    }

    #[test]
    fn nested_values_are_rejected() {
        let schema = [spec("tags", FieldType::String, false)];
        let errs = validate_row(1, &row(json!({"tags": ["a"]})), &schema).unwrap_err();
        assert!(errs[0].message.contains("single value"));
    }

    #[test]
    fn contact_schema_needs_name_and_phone() {
        let good = [
            spec("name", FieldType::String, true),
            spec("phone", FieldType::Phone, true),
        ];
        assert!(check_schema(ImportTarget::Contacts, &good).is_ok());

        let no_phone = [spec("name", FieldType::String, true)];
        assert!(check_schema(ImportTarget::Contacts, &no_phone).is_err());

        let dup = [
            spec("a", FieldType::String, false),
            spec("a", FieldType::Number, false),
        ];
        assert!(check_schema(ImportTarget::Records, &dup).is_err());
        assert!(check_schema(ImportTarget::Records, &no_phone).is_ok());
    }
}
