use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, info};

use roost_types::api::{EVENT_USER_UPGRADED, WebhookRequest};

use crate::auth::{AppState, blocking};
use crate::error::ApiError;

/// Payment provider callback. Only `user.upgraded` does anything; other
/// events are acknowledged so the provider stops retrying. The body is only
/// parsed once the key checks out.
pub async fn polka(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    state.session.authorize_webhook(&headers)?;

    let req: WebhookRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid webhook body: {e}")))?;

    if req.event != EVENT_USER_UPGRADED {
        debug!("Ignoring webhook event {}", req.event);
        return Ok(StatusCode::NO_CONTENT);
    }

    let user_id = req
        .data
        .map(|d| d.user_id)
        .ok_or_else(|| ApiError::Validation("user.upgraded event without data".into()))?;

    blocking(move || Ok(state.store.upgrade_user_tier(user_id)?)).await?;
    info!("User {} upgraded via webhook", user_id);

    Ok(StatusCode::NO_CONTENT)
}
