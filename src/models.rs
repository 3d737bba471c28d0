use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Maximum number of characters kept when an excerpt is derived from content.
pub const EXCERPT_CHARS: usize = 200;

// --- Roles ---

/// Role
///
/// Privilege level of an identity. Roles form a total order
/// (`Admin > Teacher > Student`) defined by [`Role::rank`], never by
/// declaration order or string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn rank(self) -> u8 {
        match self {
            Role::Student => 1,
            Role::Teacher => 2,
            Role::Admin => 3,
        }
    }

    /// Rank of a role given by name. Unknown names have no rank.
    pub fn rank_of(name: &str) -> Option<u8> {
        name.parse::<Role>().ok().map(Role::rank)
    }

    /// True when this role is at least as privileged as `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

// --- Core Schemas ---

/// Identity
///
/// Read-only projection of a user account. It has no password field, so it
/// can be serialized anywhere (responses, the client cache) without leaking
/// credential material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Category
///
/// Fixed set of article categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Category {
    Tutorial,
    Tech,
    Dataset,
    Code,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tutorial => "tutorial",
            Category::Tech => "tech",
            Category::Dataset => "dataset",
            Category::Code => "code",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tutorial" => Ok(Category::Tutorial),
            "tech" => Ok(Category::Tech),
            "dataset" => Ok(Category::Dataset),
            "code" => Ok(Category::Code),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Tag
///
/// Unique by name. Created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Article
///
/// The published unit of content. `author` is the identity that created it,
/// with tags inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: Category,
    pub tags: Vec<Tag>,
    pub author: Identity,
    pub published: bool,
    pub views: i64,
    pub likes: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// AuthRequest
///
/// Body of `POST /auth`. `action` selects login (the default) or register.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Display name, only read by `register`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// AuthResponse
///
/// Successful login or registration: the signed token plus the identity.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}

/// CreateArticleRequest
///
/// Body of `POST /posts`. There is deliberately no author field: the author
/// comes from the verified token and unknown body fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// UpdateArticleRequest
///
/// Partial update for `PUT /posts/{id}`. Absent fields are left untouched;
/// `tags`, when present, replaces the whole tag set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateArticleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

// --- Repository Inputs (Internal) ---

/// A user row including the password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub identity: Identity,
    pub password_hash: String,
}

/// Everything needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

/// ArticleDraft
///
/// A validated create request: tag names normalized, excerpt resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: Category,
    pub tag_names: Vec<String>,
    pub published: bool,
}

impl ArticleDraft {
    /// Validates a create request. Title and content must be non-blank.
    pub fn from_request(req: CreateArticleRequest) -> Result<Self, String> {
        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        if req.content.trim().is_empty() {
            return Err("Content is required".to_string());
        }
        let excerpt = match req.excerpt.map(|e| e.trim().to_string()) {
            Some(e) if !e.is_empty() => e,
            _ => derive_excerpt(&req.content),
        };
        Ok(Self {
            title,
            excerpt,
            category: req.category,
            tag_names: normalize_tag_names(&req.tags),
            published: req.published.unwrap_or(true),
            content: req.content,
        })
    }
}

/// ArticleChanges
///
/// A validated partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<Category>,
    pub tag_names: Option<Vec<String>>,
    pub published: Option<bool>,
}

impl ArticleChanges {
    pub fn from_request(req: UpdateArticleRequest) -> Result<Self, String> {
        let title = match req.title {
            Some(t) if t.trim().is_empty() => return Err("Title cannot be empty".to_string()),
            other => other.map(|t| t.trim().to_string()),
        };
        if matches!(&req.content, Some(c) if c.trim().is_empty()) {
            return Err("Content cannot be empty".to_string());
        }
        Ok(Self {
            title,
            content: req.content,
            excerpt: req.excerpt.map(|e| e.trim().to_string()),
            category: req.category,
            tag_names: req.tags.as_deref().map(normalize_tag_names),
            published: req.published,
        })
    }

    /// Settles the excerpt against the stored article. A blank excerpt is
    /// derived from the resulting content. New content without an excerpt
    /// re-derives it only when the stored excerpt was itself derived, so a
    /// hand-written excerpt survives a content edit.
    pub fn resolve_excerpt(mut self, current_content: &str, current_excerpt: &str) -> Self {
        let content = self.content.as_deref().unwrap_or(current_content);
        self.excerpt = match self.excerpt.take() {
            Some(excerpt) if !excerpt.is_empty() => Some(excerpt),
            Some(_) => Some(derive_excerpt(content)),
            None if self.content.is_some()
                && current_excerpt == derive_excerpt(current_content) =>
            {
                Some(derive_excerpt(content))
            }
            None => None,
        };
        self
    }
}

// --- Helpers ---

/// Trims tag names, drops blanks and collapses duplicates, keeping the order
/// in which names first appear.
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}

/// First [`EXCERPT_CHARS`] characters of `content`, with an ellipsis when cut.
pub fn derive_excerpt(content: &str) -> String {
    let trimmed = content.trim();
    match trimmed.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}…", trimmed[..cut].trim_end()),
        None => trimmed.to_string(),
    }
}
