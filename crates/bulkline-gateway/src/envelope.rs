//! The `{success, data?, error?, error_code?}` envelope returned by the proxy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, GatewayErrorCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<GatewayErrorCode>,
}

impl GatewayEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    pub fn failure(err: &GatewayError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_code: Some(err.code()),
        }
    }
}

impl From<Result<Value, GatewayError>> for GatewayEnvelope {
    fn from(result: Result<Value, GatewayError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_omits_data() {
        let env = GatewayEnvelope::failure(&GatewayError::NoCredentials);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            json!({
                "success": false,
                "error": "No gateway credentials configured for this account",
                "error_code": "NO_CREDENTIALS"
            })
        );
    }

    #[test]
    fn ok_omits_error_fields() {
        let env: GatewayEnvelope = Ok(json!({ "balance": 10.0 })).into();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, json!({ "success": true, "data": { "balance": 10.0 } }));
    }
}
