//! Signing and validation of access and refresh JWTs.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use roost_types::api::{Claims, TokenKind};

use crate::config::AuthConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("could not sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

pub type Result<T> = std::result::Result<T, TokenError>;

/// Issues and validates HS256 tokens. Stateless: revocation lives on the
/// user record, not here.
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenManager {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    pub fn issue_access(&self, subject: u64) -> Result<String> {
        self.issue(TokenKind::Access, subject, self.access_ttl)
    }

    pub fn issue_refresh(&self, subject: u64) -> Result<String> {
        self.issue(TokenKind::Refresh, subject, self.refresh_ttl)
    }

    pub fn issue(&self, kind: TokenKind, subject: u64, ttl: Duration) -> Result<String> {
        self.issue_at(kind, subject, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        subject: u64,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let claims = Claims {
            sub: subject.to_string(),
            iss: kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Check signature and expiry and return the claims.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }

    /// Validate the token and return its subject user id.
    pub fn validate(&self, token: &str) -> Result<u64> {
        let claims = self.decode(token)?;
        subject_id(&claims)
    }

    pub fn issuer_kind(&self, token: &str) -> Result<TokenKind> {
        Ok(self.decode(token)?.iss)
    }
}

pub fn subject_id(claims: &Claims) -> Result<u64> {
    claims
        .sub
        .parse()
        .map_err(|_| TokenError::Malformed(format!("subject '{}' is not a user id", claims.sub)))
}
