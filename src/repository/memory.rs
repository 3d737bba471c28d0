use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::models::{
    Article, ArticleChanges, ArticleDraft, Category, Identity, NewUser, StoredUser, Tag,
};

struct ArticleRecord {
    id: Uuid,
    author_id: Uuid,
    title: String,
    content: String,
    excerpt: String,
    category: Category,
    published: bool,
    views: i64,
    likes: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    tag_ids: Vec<i64>,
}

impl ArticleRecord {
    fn visible_to(&self, viewer: Option<Uuid>) -> bool {
        self.published || viewer == Some(self.author_id)
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<StoredUser>,
    articles: Vec<ArticleRecord>,
    tags: Vec<Tag>,
    next_tag_id: i64,
}

impl Tables {
    /// Get-or-create by exact name.
    fn resolve_tags(&mut self, names: &[String]) -> Vec<i64> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let id = match self.tags.iter().find(|t| &t.name == name) {
                Some(tag) => tag.id,
                None => {
                    self.next_tag_id += 1;
                    self.tags.push(Tag {
                        id: self.next_tag_id,
                        name: name.clone(),
                    });
                    self.next_tag_id
                }
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    fn materialize(&self, record: &ArticleRecord) -> RepoResult<Article> {
        let author = self
            .users
            .iter()
            .find(|u| u.identity.id == record.author_id)
            .map(|u| u.identity.clone())
            .ok_or_else(|| {
                RepositoryError::Corrupt(format!("article {} has no author", record.id))
            })?;

        let mut tags: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| record.tag_ids.contains(&t.id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Article {
            id: record.id,
            title: record.title.clone(),
            content: record.content.clone(),
            excerpt: record.excerpt.clone(),
            category: record.category,
            tags,
            author,
            published: record.published,
            views: record.views,
            likes: record.likes,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    fn article_mut(&mut self, id: Uuid) -> Option<&mut ArticleRecord> {
        self.articles.iter_mut().find(|a| a.id == id)
    }
}

/// InMemoryRepository
///
/// A process-local `Repository` used by the test-suite and for running the
/// server without a database. Same visibility, uniqueness and get-or-create
/// semantics as `PostgresRepository`.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<StoredUser>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.identity.email == email)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<Identity> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.identity.email == user.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            role: user.role,
            avatar_url: user.avatar_url,
        };
        tables.users.push(StoredUser {
            identity: identity.clone(),
            password_hash: user.password_hash,
        });
        Ok(identity)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<Identity>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.identity.id == id)
            .map(|u| u.identity.clone()))
    }

    async fn list_articles(&self, viewer: Option<Uuid>) -> RepoResult<Vec<Article>> {
        let tables = self.tables();
        // Newest first; records are appended, so reverse insertion breaks ties.
        let mut visible: Vec<&ArticleRecord> = tables
            .articles
            .iter()
            .rev()
            .filter(|a| a.visible_to(viewer))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        visible.into_iter().map(|a| tables.materialize(a)).collect()
    }

    async fn get_article(&self, id: Uuid, viewer: Option<Uuid>) -> RepoResult<Option<Article>> {
        let tables = self.tables();
        tables
            .articles
            .iter()
            .find(|a| a.id == id && a.visible_to(viewer))
            .map(|a| tables.materialize(a))
            .transpose()
    }

    async fn record_view(&self, id: Uuid) -> RepoResult<()> {
        if let Some(article) = self.tables().article_mut(id) {
            article.views += 1;
        }
        Ok(())
    }

    async fn create_article(&self, author_id: Uuid, draft: ArticleDraft) -> RepoResult<Article> {
        let mut tables = self.tables();
        let tag_ids = tables.resolve_tags(&draft.tag_names);
        let now = Utc::now();
        let record = ArticleRecord {
            id: Uuid::new_v4(),
            author_id,
            title: draft.title,
            content: draft.content,
            excerpt: draft.excerpt,
            category: draft.category,
            published: draft.published,
            views: 0,
            likes: 0,
            created_at: now,
            updated_at: now,
            tag_ids,
        };
        // Mirror the foreign key on `articles.author_id`.
        let article = tables.materialize(&record)?;
        tables.articles.push(record);
        Ok(article)
    }

    async fn update_article(&self, id: Uuid, changes: ArticleChanges) -> RepoResult<Option<Article>> {
        let mut tables = self.tables();
        if !tables.articles.iter().any(|a| a.id == id) {
            return Ok(None);
        }
        let tag_ids = changes
            .tag_names
            .as_deref()
            .map(|names| tables.resolve_tags(names));

        let Some(article) = tables.article_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            article.title = title;
        }
        if let Some(content) = changes.content {
            article.content = content;
        }
        if let Some(excerpt) = changes.excerpt {
            article.excerpt = excerpt;
        }
        if let Some(category) = changes.category {
            article.category = category;
        }
        if let Some(published) = changes.published {
            article.published = published;
        }
        if let Some(tag_ids) = tag_ids {
            article.tag_ids = tag_ids;
        }
        article.updated_at = Utc::now();

        let tables = &*tables;
        tables
            .articles
            .iter()
            .find(|a| a.id == id)
            .map(|a| tables.materialize(a))
            .transpose()
    }

    async fn delete_article(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables();
        let before = tables.articles.len();
        tables.articles.retain(|a| a.id != id);
        Ok(tables.articles.len() < before)
    }

    async fn like_article(&self, id: Uuid) -> RepoResult<Option<Article>> {
        let mut tables = self.tables();
        let Some(article) = tables.article_mut(id) else {
            return Ok(None);
        };
        article.likes += 1;

        let tables = &*tables;
        tables
            .articles
            .iter()
            .find(|a| a.id == id)
            .map(|a| tables.materialize(a))
            .transpose()
    }

    async fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut tags = self.tables().tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}
