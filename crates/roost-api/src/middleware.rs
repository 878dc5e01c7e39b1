use axum::http::{HeaderMap, header};
use tracing::warn;

use roost_db::models::User;
use roost_types::api::TokenKind;

use crate::auth::{AppState, blocking};
use crate::error::ApiError;

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    authorization(headers, "Bearer").ok_or(ApiError::MissingCredential)
}

/// Extract the key from `Authorization: ApiKey <key>`.
pub fn api_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    authorization(headers, "ApiKey").ok_or(ApiError::Unauthorized)
}

/// The header must be exactly two space-separated parts with the expected
/// scheme and a non-empty credential.
fn authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    let (Some(found), Some(credential), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    (found == scheme && !credential.is_empty()).then_some(credential)
}

/// Resolve the caller for a handler that requires a token of `kind`.
/// Runs the session checks off the async runtime since they touch the store.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    kind: TokenKind,
) -> Result<User, ApiError> {
    let state = state.clone();
    let headers = headers.clone();
    blocking(move || {
        state.session.authenticate_as(&headers, kind).inspect_err(|e| {
            warn!("Rejected {} token: {}", kind, e);
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_malformed_bearer_headers() {
        assert!(matches!(bearer_token(&HeaderMap::new()), Err(ApiError::MissingCredential)));
        for bad in ["Bearer", "Bearer ", "Basic abc", "bearer abc", "Bearer a b", "abc"] {
            assert!(
                matches!(bearer_token(&headers(bad)), Err(ApiError::MissingCredential)),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_api_key() {
        assert_eq!(api_key(&headers("ApiKey k-123")).unwrap(), "k-123");
        assert!(matches!(api_key(&headers("Bearer k-123")), Err(ApiError::Unauthorized)));
        assert!(matches!(api_key(&HeaderMap::new()), Err(ApiError::Unauthorized)));
    }
}
