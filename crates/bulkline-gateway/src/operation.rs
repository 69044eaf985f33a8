//! Proxy operations, discriminated by the `operation` field of the request body.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    client::{Credentials, GatewayClient},
    error::GatewayError,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum GatewayOperation {
    Balance,
    SendSms {
        #[serde(alias = "recipients")]
        to: Vec<String>,
        message: String,
        #[serde(default)]
        sender_id: Option<String>,
    },
    SubUsers,
    ResellerClients,
    TopUp {
        client: String,
        amount: f64,
    },
    /// Credential test
    Login,
}

impl GatewayOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::SendSms { .. } => "send_sms",
            Self::SubUsers => "sub_users",
            Self::ResellerClients => "reseller_clients",
            Self::TopUp { .. } => "top_up",
            Self::Login => "login",
        }
    }
}

impl GatewayClient {
    /// Run one proxy operation. `default_sender` applies when a send names none.
    pub async fn execute(
        &self,
        creds: &Credentials,
        default_sender: Option<&str>,
        op: &GatewayOperation,
    ) -> Result<Value, GatewayError> {
        match op {
            GatewayOperation::Balance => self.balance(creds).await,
            GatewayOperation::SendSms {
                to,
                message,
                sender_id,
            } => {
                let sender = sender_id.as_deref().or(default_sender);
                self.send_sms(creds, sender, to, message).await
            }
            GatewayOperation::SubUsers => self.sub_users(creds).await,
            GatewayOperation::ResellerClients => self.reseller_clients(creds).await,
            GatewayOperation::TopUp { client, amount } => {
                self.top_up(creds, client, *amount).await
            }
            GatewayOperation::Login => self.login(creds).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_operation_tag() {
        let op: GatewayOperation = serde_json::from_value(json!({ "operation": "balance" })).unwrap();
        assert!(matches!(op, GatewayOperation::Balance));

        let op: GatewayOperation = serde_json::from_value(json!({
            "operation": "send_sms",
            "recipients": ["+254712345678"],
            "message": "hi"
        }))
        .unwrap();
        match op {
            GatewayOperation::SendSms { to, sender_id, .. } => {
                assert_eq!(to, vec!["+254712345678"]);
                assert!(sender_id.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let res = serde_json::from_value::<GatewayOperation>(json!({ "operation": "delete_all" }));
        assert!(res.is_err());
    }

    #[test]
    fn names_match_wire_tags() {
        let op: GatewayOperation =
            serde_json::from_value(json!({ "operation": "top_up", "client": "c", "amount": 5 }))
                .unwrap();
        assert_eq!(op.name(), "top_up");
    }
}
