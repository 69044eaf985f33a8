//! SMS-gateway proxy function.
//!
//! `POST /functions/sms-gateway` runs one gateway operation with the caller's
//! stored credentials. Once the caller is authenticated the response is
//! always HTTP 200 with a [`GatewayEnvelope`]; gateway problems are reported
//! in `error_code`, never as HTTP errors.

use axum::{extract::State, routing::post, Json, Router};
use bulkline_common::error::BulklineResult;
use bulkline_db::repository::credentials;
use bulkline_gateway::{Credentials, GatewayEnvelope, GatewayError, GatewayOperation};
use serde_json::Value;
use std::sync::Arc;

use crate::{middleware::ApiCaller, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/functions/sms-gateway", post(sms_gateway))
}

/// Operations only a reseller account may run.
fn requires_reseller(op: &GatewayOperation) -> bool {
    matches!(
        op,
        GatewayOperation::ResellerClients | GatewayOperation::TopUp { .. }
    )
}

/// POST /api/v1/functions/sms-gateway
async fn sms_gateway(
    ApiCaller(caller): ApiCaller,
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> BulklineResult<Json<GatewayEnvelope>> {
    let op = match serde_json::from_value::<GatewayOperation>(body) {
        Ok(op) => op,
        Err(e) => {
            let err = GatewayError::InvalidRequest(format!("Unrecognised operation: {e}"));
            return Ok(Json(GatewayEnvelope::failure(&err)));
        }
    };

    let Some(stored) = credentials::get_gateway_credential(&state.db.pool, caller.user_id).await?
    else {
        return Ok(Json(GatewayEnvelope::failure(&GatewayError::NoCredentials)));
    };

    if requires_reseller(&op) && !stored.is_reseller {
        let err = GatewayError::InvalidRequest(format!(
            "'{}' requires a reseller gateway account",
            op.name()
        ));
        return Ok(Json(GatewayEnvelope::failure(&err)));
    }

    let creds = Credentials {
        username: stored.username,
        api_key: stored.api_key,
    };

    let result = state
        .gateway
        .execute(&creds, stored.sender_id.as_deref(), &op)
        .await;

    match &result {
        Ok(_) => tracing::debug!(user_id = %caller.user_id, operation = op.name(), "Gateway operation succeeded"),
        Err(e) => tracing::warn!(
            user_id = %caller.user_id,
            operation = op.name(),
            code = %e.code(),
            error = %e,
            "Gateway operation failed"
        ),
    }

    Ok(Json(GatewayEnvelope::from(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reseller_operations_are_flagged() {
        let top_up: GatewayOperation =
            serde_json::from_value(json!({"operation": "top_up", "client": "acme", "amount": 500.0}))
                .unwrap();
        assert!(requires_reseller(&top_up));

        let balance: GatewayOperation =
            serde_json::from_value(json!({"operation": "balance"})).unwrap();
        assert!(!requires_reseller(&balance));
    }

    #[test]
    fn missing_credentials_envelope() {
        let env = GatewayEnvelope::failure(&GatewayError::NoCredentials);
        let body = serde_json::to_value(env).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "NO_CREDENTIALS");
    }
}
