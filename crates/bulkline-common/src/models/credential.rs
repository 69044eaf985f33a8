//! Stored credentials: upstream SMS-gateway logins and Bulkline API keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A tenant's login for the external SMS gateway. Loaded server-side only.
#[derive(Debug, Clone, Deserialize, sqlx::FromRow)]
pub struct GatewayCredential {
    pub user_id: Uuid,
    pub username: String,
    pub api_key: String,
    pub sender_id: Option<String>,
    pub is_reseller: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read model with the API key masked.
#[derive(Debug, Serialize)]
pub struct GatewayCredentialResponse {
    pub username: String,
    pub api_key_hint: String,
    pub sender_id: Option<String>,
    pub is_reseller: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<GatewayCredential> for GatewayCredentialResponse {
    fn from(c: GatewayCredential) -> Self {
        Self {
            api_key_hint: mask_secret(&c.api_key),
            username: c.username,
            sender_id: c.sender_id,
            is_reseller: c.is_reseller,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveGatewayCredentialRequest {
    #[validate(length(min = 1, max = 100))]
    pub username: String,

    #[validate(length(min = 8, max = 256, message = "API key looks too short"))]
    pub api_key: String,

    #[validate(length(max = 11))]
    pub sender_id: Option<String>,

    #[serde(default)]
    pub is_reseller: bool,
}

/// Platform API key. Only the SHA-256 of the key is stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApiCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// First characters of the key, shown in listings
    pub key_prefix: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApiCredentialRequest {
    #[validate(length(min = 1, max = 100, message = "Key name must be 1-100 characters"))]
    pub name: String,
}

/// Keep the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_but_last_four() {
        assert_eq!(mask_secret("abcdef123456"), "********3456");
        assert_eq!(mask_secret("abc"), "***");
    }
}
