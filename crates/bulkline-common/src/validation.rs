//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes and import processing.

use std::sync::LazyLock;

use ipnetwork::IpNetwork;
use regex::Regex;
use validator::{Validate, ValidateEmail};

use crate::error::BulklineError;

/// Kenyan mobile numbers: optional `+254`/`254`/`0` prefix, then a 9-digit
/// subscriber number starting with 7 (Safaricom/Airtel) or 1 (newer ranges).
static KENYAN_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+?254|0)?([17]\d{8})$").expect("phone regex is valid")
});

/// Validate a request body, returning a BulklineError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), BulklineError> {
    body.validate().map_err(|e| BulklineError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

/// Normalize a Kenyan phone number to E.164 (`+2547XXXXXXXX` / `+2541XXXXXXXX`).
///
/// Spaces, dashes and parentheses are ignored. Returns `None` when the input
/// is not a recognizable Kenyan mobile number.
pub fn normalize_kenyan_phone(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    KENYAN_PHONE
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .map(|subscriber| format!("+254{}", subscriber.as_str()))
}

/// Like [`normalize_kenyan_phone`] but yields a validation error.
pub fn require_kenyan_phone(raw: &str) -> Result<String, BulklineError> {
    normalize_kenyan_phone(raw).ok_or_else(|| {
        BulklineError::validation(format!(
            "'{raw}' is not a valid Kenyan phone number (expected 07XXXXXXXX, 01XXXXXXXX or +254XXXXXXXXX)"
        ))
    })
}

/// Email is optional everywhere it appears, so empty input is accepted.
pub fn is_valid_email(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.validate_email()
}

/// Validate that a display name is not blank.
pub fn validate_name(name: &str) -> Result<(), BulklineError> {
    if name.trim().is_empty() {
        return Err(BulklineError::validation(
            "Name cannot be empty or whitespace only",
        ));
    }
    Ok(())
}

/// Parse every entry of an IP whitelist as an address or CIDR block.
pub fn validate_ip_whitelist(entries: &[String]) -> Result<(), BulklineError> {
    for entry in entries {
        entry.trim().parse::<IpNetwork>().map_err(|_| {
            BulklineError::validation(format!("'{entry}' is not a valid IP address or CIDR range"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_kenyan_numbers() {
        assert_eq!(normalize_kenyan_phone("0712345678").as_deref(), Some("+254712345678"));
        assert_eq!(normalize_kenyan_phone("0112345678").as_deref(), Some("+254112345678"));
        assert_eq!(normalize_kenyan_phone("254712345678").as_deref(), Some("+254712345678"));
        assert_eq!(normalize_kenyan_phone("+254712345678").as_deref(), Some("+254712345678"));
        assert_eq!(normalize_kenyan_phone("712345678").as_deref(), Some("+254712345678"));
        assert_eq!(normalize_kenyan_phone("0712 345-678").as_deref(), Some("+254712345678"));
    }

    #[test]
    fn rejects_non_kenyan_numbers() {
        assert!(normalize_kenyan_phone("123456").is_none());
        assert!(normalize_kenyan_phone("0812345678").is_none());
        assert!(normalize_kenyan_phone("07123456789").is_none());
        assert!(normalize_kenyan_phone("").is_none());
        assert!(require_kenyan_phone("123456").is_err());
    }

    #[test]
    fn email_is_optional_but_checked() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email(""));
        assert!(is_valid_email("   "));
        assert!(!is_valid_email("not-an-email"));
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_name("Nairobi customers").is_ok());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn ip_whitelist_accepts_addresses_and_cidrs() {
        let good = vec!["10.0.0.0/8".to_string(), "197.248.1.20".to_string()];
        assert!(validate_ip_whitelist(&good).is_ok());

        let bad = vec!["10.0.0.0/40".to_string()];
        assert!(validate_ip_whitelist(&bad).is_err());
    }
}
