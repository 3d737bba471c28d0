use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    credentials,
    error::{ApiError, ErrorBody},
    models::{
        Article, ArticleChanges, ArticleDraft, AuthRequest, AuthResponse, CreateArticleRequest,
        Identity, Role, Tag, UpdateArticleRequest,
    },
};

// --- Credential Issuer ---

/// auth
///
/// [Public Route] Login (`action: "login"`, the default) or registration
/// (`action: "register"`). Wrong email and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/auth",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal error", body = ErrorBody)
    )
)]
pub async fn auth(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(req) = payload?;

    match req.action.as_deref().unwrap_or("login") {
        "login" => {
            let response = credentials::issue(
                state.repo.as_ref(),
                &state.passwords,
                &state.tokens,
                &req.email,
                &req.password,
            )
            .await?;
            Ok((StatusCode::OK, Json(response)))
        }
        "register" => {
            let response = credentials::register(
                state.repo.as_ref(),
                &state.passwords,
                &state.tokens,
                &req.email,
                &req.password,
                req.name.as_deref(),
            )
            .await?;
            Ok((StatusCode::CREATED, Json(response)))
        }
        other => Err(ApiError::BadRequest(format!("Unsupported action '{other}'"))),
    }
}

/// get_me
///
/// [Authenticated Route] The caller's identity projection.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = Identity),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn get_me(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Identity>, ApiError> {
    require_identity(&state, id).await.map(Json)
}

// --- Resource Handler: reads ---

/// list_posts
///
/// [Public Route] Published articles, plus the caller's own drafts when the
/// request carries a valid token. Newest first.
#[utoipa::path(
    get,
    path = "/posts",
    responses((status = 200, description = "Articles", body = [Article]))
)]
pub async fn list_posts(
    MaybeAuthUser(caller): MaybeAuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let articles = state.repo.list_articles(caller.user_id()).await?;
    Ok(Json(articles))
}

/// get_post
///
/// [Public Route] A single article. Counts as a view.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = Article),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_post(
    MaybeAuthUser(caller): MaybeAuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Article>, ApiError> {
    let Path(id) = path?;
    let viewer = caller.user_id();
    if state.repo.get_article(id, viewer).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    state.repo.record_view(id).await?;

    state
        .repo
        .get_article(id, viewer)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// list_tags
///
/// [Public Route] Every tag ever attached to an article.
#[utoipa::path(
    get,
    path = "/tags",
    responses((status = 200, description = "Tags", body = [Tag]))
)]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.repo.list_tags().await?))
}

// --- Resource Handler: writes ---

/// create_post
///
/// [Authenticated Route] Creates an article authored by the token's identity.
/// Any `author` in the body is ignored.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Created", body = Article),
        (status = 400, description = "Invalid article", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 500, description = "Internal error", body = ErrorBody)
    )
)]
pub async fn create_post(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let Json(req) = payload?;
    let draft = ArticleDraft::from_request(req).map_err(ApiError::BadRequest)?;

    require_identity(&state, id).await?;

    let article = state.repo.create_article(id, draft).await?;
    tracing::info!(article_id = %article.id, author_id = %id, "article created");
    Ok((StatusCode::CREATED, Json(article)))
}

/// The identity behind a verified token. A token outlives its identity, so a
/// deleted account is treated as unauthenticated on every write.
async fn require_identity(state: &AppState, caller: Uuid) -> Result<Identity, ApiError> {
    state
        .repo
        .get_user(caller)
        .await?
        .ok_or(ApiError::Unauthorized)
}

/// Loads an article the caller is allowed to modify: its author, or an admin.
async fn load_for_edit(state: &AppState, caller: Uuid, id: Uuid) -> Result<Article, ApiError> {
    let identity = require_identity(state, caller).await?;

    let article = state
        .repo
        .get_article(id, Some(caller))
        .await?
        .ok_or(ApiError::NotFound)?;

    if article.author.id != caller && !identity.role.satisfies(Role::Admin) {
        return Err(ApiError::Forbidden);
    }
    Ok(article)
}

/// update_post
///
/// [Authenticated Route] Partial update. Author or admin only.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated", body = Article),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_post(
    AuthUser { id: caller }: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateArticleRequest>, JsonRejection>,
) -> Result<Json<Article>, ApiError> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let changes = ArticleChanges::from_request(req).map_err(ApiError::BadRequest)?;

    let current = load_for_edit(&state, caller, id).await?;
    let changes = changes.resolve_excerpt(&current.content, &current.excerpt);

    state
        .repo
        .update_article(id, changes)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// delete_post
///
/// [Authenticated Route] Removes an article. Author or admin only.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_post(
    AuthUser { id: caller }: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = path?;
    load_for_edit(&state, caller, id).await?;

    if state.repo.delete_article(id).await? {
        tracing::info!(article_id = %id, deleted_by = %caller, "article deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// like_post
///
/// [Authenticated Route] Adds one like to a visible article.
#[utoipa::path(
    post,
    path = "/posts/{id}/like",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Liked", body = Article),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn like_post(
    AuthUser { id: caller }: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Article>, ApiError> {
    let Path(id) = path?;
    require_identity(&state, caller).await?;
    if state.repo.get_article(id, Some(caller)).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    state
        .repo
        .like_article(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

// --- Fallbacks ---

/// Known route, unsupported verb.
pub async fn method_not_supported() -> ApiError {
    ApiError::MethodNotSupported
}

/// Unknown route.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
