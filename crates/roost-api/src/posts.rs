use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::warn;

use roost_types::api::{CleanedPostResponse, CreatePostRequest, TokenKind};
use roost_types::models::PostResponse;

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::authenticate;

pub const MAX_POST_CHARS: usize = 140;

const BANNED_WORDS: &[&str] = &["kerfuffle", "sharbert", "fornax"];
const MASK: &str = "****";

/// Enforce the length limit on the raw body, then mask banned words.
pub fn validate_post(body: &str) -> Result<String, ApiError> {
    if body.chars().count() > MAX_POST_CHARS {
        return Err(ApiError::Validation(format!(
            "post is longer than {MAX_POST_CHARS} characters"
        )));
    }

    let cleaned = body
        .split(' ')
        .map(|word| {
            if BANNED_WORDS.contains(&word.to_lowercase().as_str()) {
                MASK
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Ok(cleaned)
}

/// Dry run of post validation: report the cleaned body without storing it.
pub async fn check_post(
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cleaned_body = validate_post(&req.body)?;
    Ok(Json(CleanedPostResponse { cleaned_body }))
}

pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = validate_post(&req.body)?;
    let author = authenticate(&state, &headers, TokenKind::Access).await?;

    let post = blocking(move || Ok(state.store.create_post(&body, author.id)?)).await?;

    Ok((StatusCode::CREATED, Json(PostResponse::from(&post))))
}

pub async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let posts = blocking(move || Ok(state.store.get_posts()?)).await?;
    Ok(Json(posts.iter().map(PostResponse::from).collect::<Vec<_>>()))
}

pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let post = blocking(move || Ok(state.store.get_post(id)?)).await?;
    Ok(Json(PostResponse::from(&post)))
}

/// Delete one of the caller's own posts. Deleting a post that does not exist
/// succeeds.
pub async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = authenticate(&state, &headers, TokenKind::Access).await?;

    blocking(move || {
        match state.store.get_post(id) {
            Ok(post) if post.author_id != caller.id => {
                warn!("User {} tried to delete post {} of user {}", caller.id, id, post.author_id);
                return Err(ApiError::Forbidden("this post does not belong to you".into()));
            }
            Ok(_) | Err(roost_db::StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(state.store.delete_post(id)?)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
