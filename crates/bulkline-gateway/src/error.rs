//! Gateway error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes returned to callers in the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayErrorCode {
    AuthFailed,
    InsufficientBalance,
    InvalidSender,
    InvalidRecipient,
    AccountSuspended,
    UnknownClient,
    NoCredentials,
    InvalidRequest,
    UpstreamUnavailable,
    UpstreamError,
}

impl GatewayErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthFailed => "AUTH_FAILED",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::InvalidSender => "INVALID_SENDER",
            Self::InvalidRecipient => "INVALID_RECIPIENT",
            Self::AccountSuspended => "ACCOUNT_SUSPENDED",
            Self::UnknownClient => "UNKNOWN_CLIENT",
            Self::NoCredentials => "NO_CREDENTIALS",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamError => "UPSTREAM_ERROR",
        }
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while talking to the SMS gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No gateway credentials configured for this account")]
    NoCredentials,

    #[error("Invalid gateway request: {0}")]
    InvalidRequest(String),

    /// The gateway answered, but with a known failure phrase or an error status.
    #[error("{message}")]
    Rejected {
        code: GatewayErrorCode,
        message: String,
    },

    #[error("SMS gateway is unreachable: {0}")]
    Unavailable(String),

    #[error("Invalid gateway base URL: {0}")]
    BadBaseUrl(String),
}

impl GatewayError {
    pub fn code(&self) -> GatewayErrorCode {
        match self {
            Self::NoCredentials => GatewayErrorCode::NoCredentials,
            Self::InvalidRequest(_) | Self::BadBaseUrl(_) => GatewayErrorCode::InvalidRequest,
            Self::Rejected { code, .. } => *code,
            Self::Unavailable(_) => GatewayErrorCode::UpstreamUnavailable,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        // Request URLs carry the API key in their path; keep only the host.
        let host = e
            .url()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| "?".to_owned());
        let kind = if e.is_timeout() {
            "timed out"
        } else if e.is_connect() {
            "connection failed"
        } else if e.is_decode() || e.is_body() {
            "unreadable response"
        } else {
            "request failed"
        };
        let e = e.without_url();
        GatewayError::Unavailable(format!("{host}: {kind} ({e})"))
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(e: url::ParseError) -> Self {
        GatewayError::BadBaseUrl(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&GatewayErrorCode::InsufficientBalance).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_BALANCE\"");
        assert_eq!(GatewayErrorCode::NoCredentials.as_str(), "NO_CREDENTIALS");
    }

    #[test]
    fn rejected_error_carries_its_code() {
        let err = GatewayError::Rejected {
            code: GatewayErrorCode::InvalidSender,
            message: "Invalid Sender ID".into(),
        };
        assert_eq!(err.code(), GatewayErrorCode::InvalidSender);
        assert_eq!(err.to_string(), "Invalid Sender ID");
    }
}
