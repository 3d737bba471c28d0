use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::models::{
    Article, ArticleChanges, ArticleDraft, Category, Identity, NewUser, Role, StoredUser, Tag,
};

/// Article columns joined with the author's identity projection.
const ARTICLE_SELECT: &str = r#"
    SELECT
        a.id, a.title, a.content, a.excerpt, a.category, a.published,
        a.views, a.likes, a.created_at, a.updated_at,
        u.id AS author_id, u.name AS author_name, u.email AS author_email,
        u.role AS author_role, u.avatar_url AS author_avatar_url
    FROM articles a
    JOIN users u ON u.id = a.author_id
"#;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    avatar_url: Option<String>,
}

impl UserRow {
    fn into_identity(self) -> RepoResult<Identity> {
        Ok(Identity {
            role: parse_role(&self.role)?,
            id: self.id,
            name: self.name,
            email: self.email,
            avatar_url: self.avatar_url,
        })
    }
}

#[derive(FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(FromRow)]
struct ArticleRow {
    id: Uuid,
    title: String,
    content: String,
    excerpt: String,
    category: String,
    published: bool,
    views: i64,
    likes: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_id: Uuid,
    author_name: String,
    author_email: String,
    author_role: String,
    author_avatar_url: Option<String>,
}

impl ArticleRow {
    fn into_article(self, tags: Vec<Tag>) -> RepoResult<Article> {
        let category = self
            .category
            .parse::<Category>()
            .map_err(|e| RepositoryError::Corrupt(format!("article {}: {e}", self.id)))?;
        Ok(Article {
            author: Identity {
                id: self.author_id,
                name: self.author_name,
                email: self.author_email,
                role: parse_role(&self.author_role)?,
                avatar_url: self.author_avatar_url,
            },
            id: self.id,
            title: self.title,
            content: self.content,
            excerpt: self.excerpt,
            category,
            tags,
            published: self.published,
            views: self.views,
            likes: self.likes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ArticleTagRow {
    article_id: Uuid,
    id: i64,
    name: String,
}

fn parse_role(raw: &str) -> RepoResult<Role> {
    raw.parse::<Role>()
        .map_err(|e| RepositoryError::Corrupt(format!("role: {e}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Resolves each name to an existing tag or creates it, then links it to the
/// article. `ON CONFLICT` makes both steps safe under concurrent creates.
async fn attach_tags(conn: &mut PgConnection, article_id: Uuid, names: &[String]) -> RepoResult<()> {
    for name in names {
        let (tag_id,): (i64,) = sqlx::query_as(
            "INSERT INTO tags (name) VALUES ($1)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(article_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Loads the tags of every article in `ids` in a single query.
    async fn tags_for(&self, ids: &[Uuid]) -> RepoResult<HashMap<Uuid, Vec<Tag>>> {
        let rows = sqlx::query_as::<_, ArticleTagRow>(
            "SELECT at.article_id, t.id, t.name
             FROM article_tags at
             JOIN tags t ON t.id = at.tag_id
             WHERE at.article_id = ANY($1)
             ORDER BY t.name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_article: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_article
                .entry(row.article_id)
                .or_default()
                .push(Tag { id: row.id, name: row.name });
        }
        Ok(by_article)
    }

    async fn assemble(&self, rows: Vec<ArticleRow>) -> RepoResult<Vec<Article>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut tags = self.tags_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let article_tags = tags.remove(&row.id).unwrap_or_default();
                row.into_article(article_tags)
            })
            .collect()
    }

    /// Fetches one article without any visibility check.
    async fn fetch_article(&self, id: Uuid) -> RepoResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!("{ARTICLE_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<StoredUser>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, name, email, role, avatar_url, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> RepoResult<StoredUser> {
            Ok(StoredUser {
                identity: r.user.into_identity()?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<Identity> {
        let result = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, name, email, password_hash, role, avatar_url)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, name, email, role, avatar_url",
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.avatar_url)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.into_identity(),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "email {} already registered",
                user.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<Identity>> {
        sqlx::query_as::<_, UserRow>("SELECT id, name, email, role, avatar_url FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_identity)
            .transpose()
    }

    async fn list_articles(&self, viewer: Option<Uuid>) -> RepoResult<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "{ARTICLE_SELECT} WHERE a.published = true OR a.author_id = $1 ORDER BY a.created_at DESC"
        ))
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }

    async fn get_article(&self, id: Uuid, viewer: Option<Uuid>) -> RepoResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "{ARTICLE_SELECT} WHERE a.id = $1 AND (a.published = true OR a.author_id = $2)"
        ))
        .bind(id)
        .bind(viewer)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn record_view(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE articles SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_article(&self, author_id: Uuid, draft: ArticleDraft) -> RepoResult<Article> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO articles
                (id, author_id, title, content, excerpt, category, published, views, likes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, NOW(), NOW())",
        )
        .bind(id)
        .bind(author_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.excerpt)
        .bind(draft.category.as_str())
        .bind(draft.published)
        .execute(&mut *tx)
        .await?;

        attach_tags(&mut tx, id, &draft.tag_names).await?;
        tx.commit().await?;

        self.fetch_article(id)
            .await?
            .ok_or_else(|| RepositoryError::Corrupt(format!("article {id} vanished after insert")))
    }

    /// Uses `COALESCE` so only the provided fields change. A present tag list
    /// replaces the existing associations inside the same transaction.
    async fn update_article(&self, id: Uuid, changes: ArticleChanges) -> RepoResult<Option<Article>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE articles
             SET title = COALESCE($2, title),
                 content = COALESCE($3, content),
                 excerpt = COALESCE($4, excerpt),
                 category = COALESCE($5, category),
                 published = COALESCE($6, published),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(&changes.excerpt)
        .bind(changes.category.map(Category::as_str))
        .bind(changes.published)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(names) = &changes.tag_names {
            sqlx::query("DELETE FROM article_tags WHERE article_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            attach_tags(&mut tx, id, names).await?;
        }

        tx.commit().await?;
        self.fetch_article(id).await
    }

    async fn delete_article(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn like_article(&self, id: Uuid) -> RepoResult<Option<Article>> {
        let result = sqlx::query("UPDATE articles SET likes = likes + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_article(id).await
    }

    async fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(id, name)| Tag { id, name })
            .collect();
        Ok(tags)
    }
}
