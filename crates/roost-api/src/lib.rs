pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod password;
pub mod posts;
pub mod session;
pub mod tokens;
pub mod users;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::auth::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(health))
        .route(
            "/api/users",
            post(users::create_user).put(users::update_user).get(users::list_users),
        )
        .route("/api/users/{id}", get(users::get_user))
        .route("/api/login", post(auth::login))
        .route("/api/refresh", post(auth::refresh))
        .route("/api/revoke", post(auth::revoke))
        .route("/api/validate_chirp", post(posts::check_post))
        .route("/api/posts", post(posts::create_post).get(posts::list_posts))
        .route("/api/posts/{id}", get(posts::get_post).delete(posts::delete_post))
        .route("/api/polka/webhooks", post(webhooks::polka))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
