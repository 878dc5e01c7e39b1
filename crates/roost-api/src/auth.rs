use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{error, warn};

use roost_db::Datastore;
use roost_types::api::{LoginRequest, LoginResponse, RefreshResponse};

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::password::HashProvider;
use crate::session::SessionService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<Datastore>,
    pub session: SessionService,
}

impl AppStateInner {
    pub fn new(store: Arc<Datastore>, config: &AuthConfig, hasher: Arc<dyn HashProvider>) -> AppState {
        let session = SessionService::new(store.clone(), config, hasher);
        Arc::new(Self { store, session })
    }
}

/// Run blocking store and hashing work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = blocking(move || {
        state.session.login(&req.email, &req.password).inspect_err(|e| {
            if matches!(e, ApiError::InvalidCredentials) {
                warn!("Failed login attempt");
            }
        })
    })
    .await?;

    Ok(Json(LoginResponse {
        id: issued.user.id,
        email: issued.user.email,
        tier: issued.user.tier,
        token: issued.access_token,
        refresh_token: issued.refresh_token,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = blocking(move || state.session.refresh(&headers)).await?;
    Ok(Json(RefreshResponse { token }))
}

pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || state.session.revoke(&headers)).await?;
    Ok(StatusCode::NO_CONTENT)
}
