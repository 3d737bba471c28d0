use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: login/registration and every read.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth
        // Credential issuer: `action` selects login (default) or register.
        .route("/auth", post(handlers::auth))
        // GET /posts
        // Published articles, plus the caller's drafts when a valid token is sent.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        // Single article; increments its view counter.
        .route("/posts/{id}", get(handlers::get_post))
        // GET /tags
        .route("/tags", get(handlers::list_tags))
}
