use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use roost_db::StoreError;
use roost_types::api::TokenKind;

use crate::password::PasswordError;
use crate::tokens::TokenError;

/// Every failure a handler can report. Maps to a status code and a
/// `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or malformed authorization header")]
    MissingCredential,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("expected a {expected} token")]
    WrongTokenType { expected: TokenKind },
    #[error("token has been revoked")]
    TokenRevoked,
    #[error("token subject does not exist")]
    UnknownSubject,
    /// Login failure. Deliberately says nothing about which check failed.
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("invalid API key")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("internal error")]
    Internal,
    #[error("persistence failure")]
    Persistence(#[source] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential
            | ApiError::InvalidToken
            | ApiError::WrongTokenType { .. }
            | ApiError::TokenRevoked
            | ApiError::UnknownSubject
            | ApiError::InvalidCredentials
            | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal | ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => ApiError::Conflict(e.to_string()),
            StoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            StoreError::Stale(_) => ApiError::TokenRevoked,
            StoreError::Io { .. } | StoreError::Corrupt { .. } => ApiError::Persistence(e),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidSignature | TokenError::Expired | TokenError::Malformed(_) => {
                ApiError::InvalidToken
            }
            TokenError::Signing(e) => {
                error!("Token signing failed: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::Mismatch => ApiError::InvalidCredentials,
            PasswordError::Hashing(msg) => {
                error!("Password hashing failed: {}", msg);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Persistence(source) = &self {
            error!("Datastore failure: {}", source);
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
