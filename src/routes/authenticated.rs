use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every write. The router is wrapped in `auth_middleware`, which rejects
/// requests without a verified bearer token with 401 before any handler (and
/// therefore any storage access) runs. Handlers additionally take `AuthUser`
/// to learn who the caller is.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The caller's identity projection.
        .route("/me", get(handlers::get_me))
        // POST /posts
        // The author is always the token's identity, never the request body.
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{id}
        // Author-or-admin check is enforced in the handler.
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST /posts/{id}/like
        .route("/posts/{id}/like", post(handlers::like_post))
}
