//! Authentication — Argon2id password hashes and HS256 JWT pairs.
//!
//! Access tokens carry the account role so admin checks need no database
//! round-trip. Refresh tokens are only accepted by `/auth/refresh`.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use bulkline_common::models::user::UserRole;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

/// Prefix on every platform API key.
pub const API_KEY_PREFIX: &str = "blk_";

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    /// Token type ("access" or "refresh")
    pub token_type: String,
}

/// Token pair returned on login/register.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn generate_token(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    token_type: &str,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000);
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl)).timestamp(),
        token_type: token_type.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Generate both access and refresh tokens.
pub fn generate_token_pair(
    user_id: Uuid,
    email: &str,
    role: UserRole,
    secret: &str,
    access_ttl: u64,
    refresh_ttl: u64,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    Ok(TokenPair {
        access_token: generate_token(user_id, email, role, ACCESS_TOKEN, secret, access_ttl)?,
        refresh_token: generate_token(user_id, email, role, REFRESH_TOKEN, secret, refresh_ttl)?,
        expires_in: access_ttl,
        token_type: "Bearer".to_string(),
    })
}

/// Validate and decode a JWT token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

// ── API keys ──────────────────────────────────────────────────────────────────

/// A freshly minted API key. `plaintext` is shown to the user once.
#[derive(Debug)]
pub struct GeneratedApiKey {
    pub plaintext: String,
    pub prefix: String,
    pub hash: String,
}

pub fn generate_api_key() -> GeneratedApiKey {
    let bytes: [u8; 24] = rand::rng().random();
    let plaintext = format!("{API_KEY_PREFIX}{}", hex::encode(bytes));
    GeneratedApiKey {
        prefix: plaintext.chars().take(API_KEY_PREFIX.len() + 6).collect(),
        hash: hash_api_key(&plaintext),
        plaintext,
    }
}

/// SHA-256 hex digest used to look keys up.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-enough-entropy-0123456789";

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn token_pair_carries_role_and_type() {
        let id = Uuid::now_v7();
        let pair =
            generate_token_pair(id, "ops@example.co.ke", UserRole::Admin, SECRET, 900, 3600).unwrap();

        let access = validate_token(&pair.access_token, SECRET).unwrap();
        assert_eq!(access.sub, id.to_string());
        assert_eq!(access.role, UserRole::Admin);
        assert_eq!(access.token_type, ACCESS_TOKEN);

        let refresh = validate_token(&pair.refresh_token, SECRET).unwrap();
        assert_eq!(refresh.token_type, REFRESH_TOKEN);
        assert_eq!(pair.expires_in, 900);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let pair =
            generate_token_pair(Uuid::now_v7(), "a@b.com", UserRole::Client, SECRET, 60, 60)
                .unwrap();
        assert!(validate_token(&pair.access_token, "another-secret").is_err());
    }

    #[test]
    fn api_keys_are_prefixed_and_hashed() {
        let key = generate_api_key();
        assert!(key.plaintext.starts_with(API_KEY_PREFIX));
        assert_eq!(key.plaintext.len(), API_KEY_PREFIX.len() + 48);
        assert!(key.plaintext.starts_with(&key.prefix));
        assert_eq!(key.hash, hash_api_key(&key.plaintext));
        assert_eq!(key.hash.len(), 64);
    }
}
