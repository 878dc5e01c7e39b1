//! Request authentication, login, refresh and revocation.
//!
//! An authenticated request walks `NoToken -> ExtractedToken ->
//! SignatureValidated -> IssuerMatched -> UserResolved -> NotRevoked`; the
//! first failing step ends the request.

use std::sync::Arc;

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use roost_db::models::User;
use roost_db::{Datastore, StoreError};
use roost_types::api::TokenKind;

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::middleware::{api_key, bearer_token};
use crate::password::{CredentialVerifier, HashProvider};
use crate::tokens::{TokenManager, subject_id};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

pub struct SessionService {
    store: Arc<Datastore>,
    tokens: TokenManager,
    credentials: CredentialVerifier,
    webhook_api_key: String,
}

impl SessionService {
    pub fn new(store: Arc<Datastore>, config: &AuthConfig, hasher: Arc<dyn HashProvider>) -> Self {
        Self {
            store,
            tokens: TokenManager::new(config),
            credentials: CredentialVerifier::new(hasher),
            webhook_api_key: config.webhook_api_key.clone(),
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn credentials(&self) -> &CredentialVerifier {
        &self.credentials
    }

    /// Authenticate the request as the holder of a current, unrevoked token
    /// of exactly `required` kind.
    pub fn authenticate_as(&self, headers: &HeaderMap, required: TokenKind) -> Result<User, ApiError> {
        let token = bearer_token(headers)?;

        let claims = self.tokens.decode(token)?;

        if claims.iss != required {
            return Err(ApiError::WrongTokenType { expected: required });
        }

        let user = match self.store.get_user(subject_id(&claims)?) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(ApiError::UnknownSubject),
            Err(e) => return Err(e.into()),
        };

        let (revoked_at, current) = match required {
            TokenKind::Access => (user.access_revoked_at, user.access_token.as_deref()),
            TokenKind::Refresh => (user.refresh_revoked_at, user.refresh_token.as_deref()),
        };
        if revoked_at.is_some() || current != Some(token) {
            return Err(ApiError::TokenRevoked);
        }

        Ok(user)
    }

    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub fn login(&self, email: &str, password: &str) -> Result<IssuedTokens, ApiError> {
        let user = match self.store.find_user_by_email(email) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(ApiError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        self.credentials
            .verify(password, &user.password_digest)
            .map_err(|_| ApiError::InvalidCredentials)?;

        let access_token = self.tokens.issue_access(user.id)?;
        let refresh_token = self.tokens.issue_refresh(user.id)?;
        let user = self.store.set_user_tokens(user.id, &access_token, &refresh_token)?;

        info!("User {} logged in", user.id);
        Ok(IssuedTokens {
            access_token,
            refresh_token,
            user,
        })
    }

    /// Exchange a refresh token for a new access token. The refresh token is
    /// not rotated. The store re-checks that the refresh token is still
    /// current in the same write that installs the access token, so a revoke
    /// or login racing this call wins.
    pub fn refresh(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let user = self.authenticate_as(headers, TokenKind::Refresh)?;
        let refresh_token = bearer_token(headers)?;
        let access_token = self.tokens.issue_access(user.id)?;
        self.store.refresh_access_token(user.id, refresh_token, &access_token)?;
        debug!("Issued refreshed access token for user {}", user.id);
        Ok(access_token)
    }

    /// Revoke the presented token. Any kind is accepted as long as the
    /// signature holds; the token's own kind picks which stamp is set.
    /// Revoking a token that is no longer current is a no-op.
    pub fn revoke(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let token = bearer_token(headers)?;
        let kind = self.tokens.issuer_kind(token)?;

        let revoked = match kind {
            TokenKind::Access => self.store.revoke_access_token(token),
            TokenKind::Refresh => self.store.revoke_refresh_token(token),
        };
        match revoked {
            Ok(user) => {
                info!("Revoked {} token of user {}", kind, user.id);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                debug!("Revoked {} token has no current owner", kind);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check the payment provider's `ApiKey` header.
    pub fn authorize_webhook(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let key = api_key(headers)?;
        if !bool::from(key.as_bytes().ct_eq(self.webhook_api_key.as_bytes())) {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}
