use std::fmt;

use chrono::Duration;

/// Authentication settings, built once at startup and handed to the
/// components that need them.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing access and refresh tokens.
    pub jwt_secret: String,
    /// Shared key the payment provider sends as `Authorization: ApiKey <key>`.
    pub webhook_api_key: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>, webhook_api_key: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            webhook_api_key: webhook_api_key.into(),
            access_token_ttl: default_access_ttl(),
            refresh_token_ttl: default_refresh_ttl(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("webhook_api_key", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

pub fn default_access_ttl() -> Duration {
    Duration::hours(1)
}

pub fn default_refresh_ttl() -> Duration {
    Duration::days(60)
}
