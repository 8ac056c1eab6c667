//! JWT token generation and validation
//!
//! Access and refresh tokens are signed with separate secrets. Keys are
//! derived once and shared behind `Arc`.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use photogram_shared::TokenPair;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// JWT claims. `sub` (the user id) is the only claim that is trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
    /// Random per token, so two tokens minted in the same second differ
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid("bad subject".to_string()))
    }
}

/// Token verification failure
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token expired")]
    Expired,

    #[error("unexpected token type")]
    WrongType,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err.to_string()),
        }
    }
}

#[derive(Clone)]
struct KeyPair {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl KeyPair {
    fn new(secret: &str) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
        }
    }
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    access: KeyPair,
    refresh: KeyPair,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    validation: Arc<Validation>,
}

impl JwtService {
    /// Call once at startup and store in AppState
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            access: KeyPair::new(access_secret),
            refresh: KeyPair::new(refresh_secret),
            access_ttl_secs,
            refresh_ttl_secs,
            validation: Arc::new(validation),
        }
    }

    pub fn from_config(config: &crate::config::JwtConfig) -> Self {
        Self::new(
            &config.access_secret,
            &config.refresh_secret,
            config.access_token_expiry_secs,
            config.refresh_token_expiry_secs,
        )
    }

    #[inline]
    pub fn issue_access_token(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue(user_id, ACCESS, &self.access, self.access_ttl_secs)
    }

    #[inline]
    pub fn issue_refresh_token(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue(user_id, REFRESH, &self.refresh, self.refresh_ttl_secs)
    }

    pub fn issue_pair(&self, user_id: Uuid) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id)?,
            refresh_token: self.issue_refresh_token(user_id)?,
        })
    }

    fn issue(
        &self,
        user_id: Uuid,
        token_type: &str,
        keys: &KeyPair,
        ttl_secs: i64,
    ) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
            token_type: token_type.to_string(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &keys.encoding)
            .map_err(|e| anyhow::anyhow!("Failed to generate {} token: {}", token_type, e))
    }

    #[inline]
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, &self.access, ACCESS)
    }

    #[inline]
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, &self.refresh, REFRESH)
    }

    fn verify(&self, token: &str, keys: &KeyPair, expected: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &keys.decoding, &self.validation)?;
        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }

    #[inline]
    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    #[inline]
    pub fn refresh_token_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }
}
