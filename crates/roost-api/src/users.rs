use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use roost_types::api::{CreateUserRequest, TokenKind, UpdateUserRequest};
use roost_types::models::UserResponse;

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::authenticate;

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("email is not valid".into()));
    }
    if password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".into()));
    }
    Ok(())
}

pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&req.email, &req.password)?;

    let user = blocking(move || {
        let digest = state.session.credentials().digest(&req.password)?;
        Ok(state.store.create_user(&req.email, &digest)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Change the caller's own email and password.
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = authenticate(&state, &headers, TokenKind::Access).await?;
    validate_credentials(&req.email, &req.password)?;

    let user = blocking(move || {
        let digest = state.session.credentials().digest(&req.password)?;
        Ok(state.store.update_user(caller.id, &req.email, &digest)?)
    })
    .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// All users, ordered by id.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(move || Ok(state.store.get_users()?)).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect::<Vec<_>>()))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(move || Ok(state.store.get_user(id)?)).await?;
    Ok(Json(UserResponse::from(&user)))
}
