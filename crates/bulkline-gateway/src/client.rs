//! Outbound HTTP client for the SMS gateway.
//!
//! The gateway takes credentials as URL path segments for reads and in the
//! JSON body for writes. Every response goes through
//! [`phrases::interpret`](crate::phrases::interpret).

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{error::GatewayError, phrases};

/// A tenant's gateway login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
}

/// Body of `POST /sms/send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendSmsPayload<'a> {
    pub username: &'a str,
    pub api_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<&'a str>,
    /// Comma-separated recipients
    pub to: String,
    pub message: &'a str,
}

/// Body of `POST /reseller/topup`.
#[derive(Debug, Clone, Serialize)]
pub struct TopUpPayload<'a> {
    pub username: &'a str,
    pub api_key: &'a str,
    pub client: &'a str,
    pub amount: f64,
}

#[derive(Clone)]
pub struct GatewayClient {
    base_url: Url,
    http: Client,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::BadBaseUrl(base_url.to_string()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Bulkline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self { base_url, http })
    }

    // ── Account ──────────────────────────────────────────────────────────────

    /// `GET /account/balance/{username}/{api_key}`
    pub async fn balance(&self, creds: &Credentials) -> Result<Value, GatewayError> {
        let data = self
            .get(&["account", "balance", &creds.username, &creds.api_key])
            .await?;
        Ok(phrases::normalize_balance(data))
    }

    /// `GET /account/login/{username}/{api_key}`
    pub async fn login(&self, creds: &Credentials) -> Result<Value, GatewayError> {
        self.get(&["account", "login", &creds.username, &creds.api_key]).await
    }

    /// `GET /account/subusers/{username}/{api_key}`
    pub async fn sub_users(&self, creds: &Credentials) -> Result<Value, GatewayError> {
        self.get(&["account", "subusers", &creds.username, &creds.api_key]).await
    }

    // ── Messaging ────────────────────────────────────────────────────────────

    /// `POST /sms/send`
    pub async fn send_sms(
        &self,
        creds: &Credentials,
        sender: Option<&str>,
        recipients: &[String],
        message: &str,
    ) -> Result<Value, GatewayError> {
        if recipients.is_empty() {
            return Err(GatewayError::InvalidRequest("At least one recipient is required".into()));
        }
        if message.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("Message must not be empty".into()));
        }

        let payload = SendSmsPayload {
            username: &creds.username,
            api_key: &creds.api_key,
            sender,
            to: recipients.join(","),
            message,
        };
        self.post(&["sms", "send"], &payload).await
    }

    // ── Reseller ─────────────────────────────────────────────────────────────

    /// `GET /reseller/clients/{username}/{api_key}`
    pub async fn reseller_clients(&self, creds: &Credentials) -> Result<Value, GatewayError> {
        self.get(&["reseller", "clients", &creds.username, &creds.api_key]).await
    }

    /// `POST /reseller/topup`
    pub async fn top_up(
        &self,
        creds: &Credentials,
        client: &str,
        amount: f64,
    ) -> Result<Value, GatewayError> {
        if client.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("Client is required".into()));
        }
        if !(amount.is_finite() && amount > 0.0) {
            return Err(GatewayError::InvalidRequest("Amount must be positive".into()));
        }

        let payload = TopUpPayload {
            username: &creds.username,
            api_key: &creds.api_key,
            client,
            amount,
        };
        self.post(&["reseller", "topup"], &payload).await
    }

    // ── Request helpers ──────────────────────────────────────────────────────

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::BadBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, segments: &[&str]) -> Result<Value, GatewayError> {
        let url = self.endpoint(segments)?;
        // Path carries the API key; log only the operation segments.
        debug!(op = %segments[..2.min(segments.len())].join("/"), "Gateway GET");
        let resp = self.http.get(url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        phrases::interpret(status, &body)
    }

    async fn post<B: Serialize>(&self, segments: &[&str], body: &B) -> Result<Value, GatewayError> {
        let url = self.endpoint(segments)?;
        debug!(op = %segments.join("/"), "Gateway POST");
        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        phrases::interpret(status, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayErrorCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> Credentials {
        Credentials {
            username: "acme".into(),
            api_key: "k3y/with space".into(),
        }
    }

    async fn client_for(server: &MockServer) -> GatewayClient {
        GatewayClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn balance_text_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account/balance/acme/k3y%2Fwith%20space"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Balance: 1,234.50"))
            .mount(&server)
            .await;

        let data = client_for(&server).await.balance(&creds()).await.unwrap();
        assert_eq!(data["balance"], json!(1234.5));
    }

    #[tokio::test]
    async fn auth_failure_text_maps_to_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account/login/acme/k3y%2Fwith%20space"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("Error 100: Authentication Failure"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).await.login(&creds()).await.unwrap_err();
        assert_eq!(err.code(), GatewayErrorCode::AuthFailed);
    }

    #[tokio::test]
    async fn send_sms_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms/send"))
            .and(body_json(json!({
                "username": "acme",
                "api_key": "k3y/with space",
                "sender": "ACME",
                "to": "+254712345678,+254798765432",
                "message": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message_id": "m-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let recipients = vec!["+254712345678".to_string(), "+254798765432".to_string()];
        let data = client_for(&server)
            .await
            .send_sms(&creds(), Some("ACME"), &recipients, "hello")
            .await
            .unwrap();
        assert_eq!(data["message_id"], "m-1");
    }

    #[tokio::test]
    async fn send_sms_rejects_empty_recipients_without_calling_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .send_sms(&creds(), None, &[], "hello")
            .await
            .unwrap_err();
        assert_eq!(err.code(), GatewayErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn top_up_insufficient_balance() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reseller/topup"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Insufficient Balance"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .top_up(&creds(), "client-7", 500.0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), GatewayErrorCode::InsufficientBalance);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_unavailable() {
        // Nothing listens on port 9 of the loopback interface.
        let client = GatewayClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.sub_users(&creds()).await.unwrap_err();
        assert_eq!(err.code(), GatewayErrorCode::UpstreamUnavailable);
    }

    #[tokio::test]
    async fn transport_errors_never_echo_the_api_key() {
        let client = GatewayClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let creds = Credentials {
            username: "acme".into(),
            api_key: "SUPERSECRETKEY".into(),
        };
        let err = client.balance(&creds).await.unwrap_err();

        assert_eq!(err.code(), GatewayErrorCode::UpstreamUnavailable);
        let text = err.to_string();
        assert!(text.contains("127.0.0.1"), "{text}");
        assert!(!text.contains("SUPERSECRETKEY"), "{text}");
        assert!(!text.contains("/account/balance"), "{text}");
    }

    #[test]
    fn rejects_non_base_url() {
        assert!(GatewayClient::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
    }
}
