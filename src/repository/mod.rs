use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{Article, ArticleChanges, ArticleDraft, Identity, NewUser, StoredUser, Tag},
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// Failures surfaced by a `Repository` implementation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A uniqueness constraint was violated (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),
    /// A stored value could not be decoded into its domain type.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(what) => ApiError::Conflict(what),
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever
/// see `Arc<dyn Repository>`, so Postgres and the in-memory store are
/// interchangeable.
///
/// `viewer` parameters implement draft visibility: a draft is visible only to
/// its author, a published article to everyone.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identities ---
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<StoredUser>>;
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> RepoResult<Identity>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<Identity>>;

    // --- Articles ---
    /// Visible articles, newest first.
    async fn list_articles(&self, viewer: Option<Uuid>) -> RepoResult<Vec<Article>>;
    async fn get_article(&self, id: Uuid, viewer: Option<Uuid>) -> RepoResult<Option<Article>>;
    async fn record_view(&self, id: Uuid) -> RepoResult<()>;
    /// Inserts the article and resolves its tags (get-or-create) atomically.
    async fn create_article(&self, author_id: Uuid, draft: ArticleDraft) -> RepoResult<Article>;
    /// Returns `None` when the article does not exist.
    async fn update_article(&self, id: Uuid, changes: ArticleChanges) -> RepoResult<Option<Article>>;
    async fn delete_article(&self, id: Uuid) -> RepoResult<bool>;
    /// Increments the like counter. `None` when the article does not exist.
    async fn like_article(&self, id: Uuid) -> RepoResult<Option<Article>>;

    // --- Tags ---
    /// Every known tag, ordered by name.
    async fn list_tags(&self) -> RepoResult<Vec<Tag>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
