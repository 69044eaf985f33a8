//! Translation of raw gateway responses.
//!
//! The gateway reports failures as free text ("Error 100: Authentication
//! Failure") even on HTTP 200, so every response body passes through
//! [`interpret`] before it reaches a caller. Known failure phrases live in one
//! table; matching is case-insensitive.

use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayErrorCode};

/// Known failure phrases, checked in order.
pub const PHRASES: &[(&str, GatewayErrorCode)] = &[
    ("authentication failure", GatewayErrorCode::AuthFailed),
    ("error 100", GatewayErrorCode::AuthFailed),
    ("insufficient balance", GatewayErrorCode::InsufficientBalance),
    ("invalid sender", GatewayErrorCode::InvalidSender),
    ("invalid number", GatewayErrorCode::InvalidRecipient),
    ("account suspended", GatewayErrorCode::AccountSuspended),
    ("inactive", GatewayErrorCode::AccountSuspended),
    ("unknown client", GatewayErrorCode::UnknownClient),
];

/// First error code whose phrase appears in `text`.
pub fn match_phrase(text: &str) -> Option<GatewayErrorCode> {
    let lower = text.to_lowercase();
    PHRASES
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, code)| *code)
}

/// Turn an upstream status and body into data or a typed error.
///
/// JSON bodies are only scanned in their top-level `error`, `message`, and
/// `status` strings, so list payloads that merely mention a phrase (an
/// inactive sub-user, say) are not mistaken for failures. Plain-text bodies
/// are scanned whole and wrapped as `{"message": text}`.
pub fn interpret(status: u16, body: &str) -> Result<Value, GatewayError> {
    let trimmed = body.trim();
    let parsed = serde_json::from_str::<Value>(trimmed).ok();

    let scanned = match &parsed {
        Some(Value::Object(map)) => ["error", "message", "status"]
            .iter()
            .filter_map(|k| map.get(*k).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" "),
        Some(_) => String::new(),
        None => trimmed.to_owned(),
    };

    if let Some(code) = match_phrase(&scanned) {
        return Err(GatewayError::Rejected {
            code,
            message: failure_message(&parsed, trimmed),
        });
    }

    if !(200..300).contains(&status) {
        return Err(GatewayError::Rejected {
            code: GatewayErrorCode::UpstreamError,
            message: format!("Gateway returned HTTP {status}: {}", failure_message(&parsed, trimmed)),
        });
    }

    Ok(parsed.unwrap_or_else(|| json!({ "message": trimmed })))
}

fn failure_message(parsed: &Option<Value>, raw: &str) -> String {
    parsed
        .as_ref()
        .and_then(|v| v.get("error").or_else(|| v.get("message")))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| raw.to_owned())
}

/// Pull a number out of balance text such as `Balance: KES 1,234.50`.
pub fn parse_balance(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    let number = number.trim_end_matches('.');
    let value: f64 = number.parse().ok()?;
    let negative = text[..start].trim_end().ends_with('-');
    Some(if negative { -value } else { value })
}

/// Normalize a balance response into `{"balance": n, ...}` when a figure can be found.
pub fn normalize_balance(data: Value) -> Value {
    let figure = match &data {
        Value::Object(map) => match map.get("balance") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => parse_balance(s),
            _ => map.get("message").and_then(Value::as_str).and_then(parse_balance),
        },
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_balance(s),
        _ => None,
    };

    match (figure, data) {
        (Some(balance), Value::Object(mut map)) => {
            map.insert("balance".into(), json!(balance));
            Value::Object(map)
        }
        (Some(balance), other) => json!({ "balance": balance, "raw": other }),
        (None, other) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_matching_is_case_insensitive() {
        assert_eq!(
            match_phrase("Error 100: Authentication Failure"),
            Some(GatewayErrorCode::AuthFailed)
        );
        assert_eq!(
            match_phrase("INSUFFICIENT BALANCE on account"),
            Some(GatewayErrorCode::InsufficientBalance)
        );
        assert_eq!(match_phrase("Account is inactive"), Some(GatewayErrorCode::AccountSuspended));
        assert_eq!(match_phrase("Unknown Client ref 42"), Some(GatewayErrorCode::UnknownClient));
        assert_eq!(match_phrase("Invalid number 0712"), Some(GatewayErrorCode::InvalidRecipient));
        assert_eq!(match_phrase("Message queued"), None);
    }

    #[test]
    fn plain_text_success_is_wrapped() {
        let data = interpret(200, "Message queued\n").unwrap();
        assert_eq!(data, json!({ "message": "Message queued" }));
    }

    #[test]
    fn json_body_passes_through() {
        let data = interpret(200, r#"{"users":[{"name":"a","status":"inactive"}]}"#).unwrap();
        assert_eq!(data["users"][0]["name"], "a");
    }

    #[test]
    fn json_error_field_is_translated() {
        let err = interpret(200, r#"{"error":"Invalid Sender ID"}"#).unwrap_err();
        assert_eq!(err.code(), GatewayErrorCode::InvalidSender);
        assert_eq!(err.to_string(), "Invalid Sender ID");
    }

    #[test]
    fn phrase_wins_over_success_status() {
        let err = interpret(200, "Insufficient Balance").unwrap_err();
        assert_eq!(err.code(), GatewayErrorCode::InsufficientBalance);
    }

    #[test]
    fn unmatched_error_status_is_upstream_error() {
        let err = interpret(502, "Bad Gateway").unwrap_err();
        assert_eq!(err.code(), GatewayErrorCode::UpstreamError);
    }

    #[test]
    fn parses_balance_text() {
        assert_eq!(parse_balance("Balance: 1,234.50"), Some(1234.5));
        assert_eq!(parse_balance("KES 900"), Some(900.0));
        assert_eq!(parse_balance("Balance: -20.5"), Some(-20.5));
        assert_eq!(parse_balance("no figure"), None);
    }

    #[test]
    fn normalizes_balance_message() {
        let data = normalize_balance(json!({ "message": "Balance: 1,234.50" }));
        assert_eq!(data["balance"], json!(1234.5));
        assert_eq!(data["message"], "Balance: 1,234.50");

        let data = normalize_balance(json!({ "balance": "77.25" }));
        assert_eq!(data["balance"], json!(77.25));
    }
}
