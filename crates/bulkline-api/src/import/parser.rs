//! File parsing for import jobs.
//!
//! CSV: first record is the header. Fields may be quoted; inside quotes `""`
//! is a literal quote and newlines are kept. A leading UTF-8 BOM and blank
//! lines are ignored. Short records are padded with empty values.
//!
//! JSON: a top-level array of objects.
//!
//! Whole-file problems are a [`ParseError`]; a malformed individual row is an
//! `Err` in its slot so the rest of the file can still be processed.

use bulkline_common::models::import_job::ImportFormat;
use serde_json::{Map, Value};
use thiserror::Error;

/// One data row keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("File is empty")]
    Empty,

    #[error("CSV header has an empty column name at position {0}")]
    EmptyHeader(usize),

    #[error("CSV header repeats column '{0}'")]
    DuplicateHeader(String),

    #[error("Unterminated quoted field")]
    UnterminatedQuote,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("JSON imports must be an array of objects")]
    NotAnArray,
}

/// Parse file contents into rows in file order.
pub fn parse(format: ImportFormat, text: &str) -> Result<Vec<Result<Row, String>>, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    match format {
        ImportFormat::Csv => parse_csv(text),
        ImportFormat::Json => parse_json(text),
    }
}

fn parse_csv(text: &str) -> Result<Vec<Result<Row, String>>, ParseError> {
    let mut records = csv_records(text)?.into_iter();

    let headers: Vec<String> = records
        .next()
        .ok_or(ParseError::Empty)?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    for (i, header) in headers.iter().enumerate() {
        if header.is_empty() {
            return Err(ParseError::EmptyHeader(i + 1));
        }
        if headers[..i].contains(header) {
            return Err(ParseError::DuplicateHeader(header.clone()));
        }
    }

    Ok(records
        .map(|values| {
            if values.len() > headers.len() {
                return Err(format!(
                    "Expected {} columns, found {}",
                    headers.len(),
                    values.len()
                ));
            }
            let mut row = Row::new();
            for (i, header) in headers.iter().enumerate() {
                let value = values.get(i).cloned().unwrap_or_default();
                row.insert(header.clone(), Value::String(value));
            }
            Ok(row)
        })
        .collect())
}

/// Split CSV text into records of raw field values.
fn csv_records(text: &str) -> Result<Vec<Vec<String>>, ParseError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    fn finish(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, field: &mut String) {
        record.push(std::mem::take(field));
        let blank = record.len() == 1 && record[0].trim().is_empty();
        let done = std::mem::take(record);
        if !blank {
            records.push(done);
        }
    }

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => finish(&mut records, &mut record, &mut field),
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote);
    }
    if !field.is_empty() || !record.is_empty() {
        finish(&mut records, &mut record, &mut field);
    }

    Ok(records)
}

fn parse_json(text: &str) -> Result<Vec<Result<Row, String>>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(ParseError::NotAnArray);
    };

    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => Err(format!("Expected an object, found {}", json_kind(&other))),
        })
        .collect())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(text: &str) -> Vec<Result<Row, String>> {
        parse(ImportFormat::Csv, text).unwrap()
    }

    #[test]
    fn simple_csv_with_header() {
        let rows = csv("name,phone\nAlice,0712345678\nBob,123456\n");
        assert_eq!(rows.len(), 2);
        let alice = rows[0].as_ref().unwrap();
        assert_eq!(alice["name"], "Alice");
        assert_eq!(alice["phone"], "0712345678");
    }

    #[test]
    fn quoted_fields_keep_commas_quotes_and_newlines() {
        let rows = csv("name,notes\r\n\"Otieno, J\",\"said \"\"hi\"\"\nthen left\"\r\n");
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row["name"], "Otieno, J");
        assert_eq!(row["notes"], "said \"hi\"\nthen left");
    }

    #[test]
    fn bom_and_blank_lines_are_ignored() {
        let rows = csv("\u{feff}name,phone\n\nAlice,0712345678\n\n");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].as_ref().unwrap().contains_key("name"));
    }

    #[test]
    fn short_rows_pad_and_long_rows_fail() {
        let rows = csv("a,b,c\n1\n1,2,3,4\n");
        let short = rows[0].as_ref().unwrap();
        assert_eq!(short["c"], "");
        assert_eq!(rows[1].as_ref().unwrap_err(), "Expected 3 columns, found 4");
    }

    #[test]
    fn header_problems_fail_the_file() {
        assert_eq!(parse(ImportFormat::Csv, ""), Err(ParseError::Empty));
        assert_eq!(parse(ImportFormat::Csv, "a,,c\n"), Err(ParseError::EmptyHeader(2)));
        assert_eq!(
            parse(ImportFormat::Csv, "a,a\n"),
            Err(ParseError::DuplicateHeader("a".into()))
        );
        assert_eq!(
            parse(ImportFormat::Csv, "a\n\"open\n"),
            Err(ParseError::UnterminatedQuote)
        );
    }

    #[test]
    fn json_array_of_objects() {
        let rows = parse(
            ImportFormat::Json,
            r#"[{"name":"Alice","age":31}, 5, {"name":"Bob"}]"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap()["age"], 31);
        assert_eq!(rows[1].as_ref().unwrap_err(), "Expected an object, found a number");
    }

    #[test]
    fn json_must_be_an_array() {
        assert_eq!(
            parse(ImportFormat::Json, r#"{"name":"Alice"}"#),
            Err(ParseError::NotAnArray)
        );
        assert!(matches!(
            parse(ImportFormat::Json, "[{"),
            Err(ParseError::InvalidJson(_))
        ));
    }
}
