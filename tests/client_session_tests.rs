use chrono::Utc;
use content_portal::{
    client::{
        AuthSession, FileStore, KeyValueStore, MemoryStore, PostFilter, StoreError, TOKEN_KEY,
        USER_KEY,
    },
    models::{Article, Category, Identity, Role, Tag},
};
use std::{fs, io, path::PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

// --- Helpers ---

fn identity(role: Role) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        name: "Cached".to_string(),
        email: "cached@example.com".to_string(),
        role,
        avatar_url: None,
    }
}

fn session_as(role: Role) -> AuthSession<MemoryStore> {
    let session = AuthSession::new(MemoryStore::new());
    session.save("token-value", &identity(role)).unwrap();
    session
}

fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("session.json")
}

// --- Permission checks ---

#[test]
fn test_teacher_permissions() {
    let session = session_as(Role::Teacher);

    assert!(session.has_permission(Role::Student));
    assert!(session.has_permission(Role::Teacher));
    assert!(!session.has_permission(Role::Admin));
    assert!(session.has_permission_named("student"));
    assert!(!session.has_permission_named("admin"));
}

#[test]
fn test_admin_satisfies_everything() {
    let session = session_as(Role::Admin);
    for role in [Role::Student, Role::Teacher, Role::Admin] {
        assert!(session.has_permission(role));
    }
}

#[test]
fn test_no_user_denies_everything() {
    let session = AuthSession::new(MemoryStore::new());

    assert!(!session.is_authenticated());
    assert!(session.current_user().is_none());
    assert!(!session.has_permission(Role::Student));
}

#[test]
fn test_unknown_required_role_is_denied() {
    let session = session_as(Role::Admin);
    assert!(!session.has_permission_named("superuser"));
    assert!(!session.has_permission_named(""));
}

// --- Cache contents ---

#[test]
fn test_save_stores_token_and_identity() {
    let user = identity(Role::Student);
    let session = AuthSession::new(MemoryStore::new());

    session.save("abc.def.ghi", &user).unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.token().as_deref(), Some("abc.def.ghi"));
    assert_eq!(session.current_user(), Some(user));
}

#[test]
fn test_blank_token_is_not_authenticated() {
    let session = AuthSession::new(MemoryStore::new());
    session.store().set(TOKEN_KEY, "   ").unwrap();
    assert!(!session.is_authenticated());
}

#[test]
fn test_corrupt_cached_user_reads_as_absent() {
    let session = AuthSession::new(MemoryStore::new());
    session.store().set(TOKEN_KEY, "t").unwrap();
    session.store().set(USER_KEY, "{not json").unwrap();

    assert!(session.current_user().is_none());
    assert!(!session.has_permission(Role::Student));
}

#[test]
fn test_unknown_cached_role_denies_permission() {
    let session = AuthSession::new(MemoryStore::new());
    let raw = serde_json::json!({
        "id": Uuid::new_v4(),
        "name": "Odd",
        "email": "odd@example.com",
        "role": "superuser"
    });
    session.store().set(USER_KEY, &raw.to_string()).unwrap();

    assert!(session.current_user().is_none());
    assert!(!session.has_permission(Role::Student));
}

#[test]
fn test_clear_auth_is_idempotent() {
    let session = session_as(Role::Teacher);

    session.clear_auth().unwrap();
    session.clear_auth().unwrap();

    assert!(!session.is_authenticated());
    assert!(session.current_user().is_none());
    assert!(session.store().get(TOKEN_KEY).is_none());
    assert!(session.store().get(USER_KEY).is_none());
}

/// A store whose token entry cannot be deleted.
struct StuckTokenStore {
    inner: MemoryStore,
}

impl KeyValueStore for StuckTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        if key == TOKEN_KEY {
            return Err(StoreError::Io(io::Error::other("token entry is locked")));
        }
        self.inner.delete(key)
    }
}

#[test]
fn test_clear_auth_removes_user_even_when_token_delete_fails() {
    let session = AuthSession::new(StuckTokenStore {
        inner: MemoryStore::new(),
    });
    session.save("stuck", &identity(Role::Admin)).unwrap();

    let result = session.clear_auth();

    assert!(matches!(result, Err(StoreError::Io(_))));
    assert!(session.store().get(USER_KEY).is_none());
    assert!(session.current_user().is_none());
    assert!(!session.has_permission(Role::Student));
}

// --- FileStore ---

#[test]
fn test_file_store_persists_across_instances() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = store_path(&dir);
    let user = identity(Role::Admin);

    AuthSession::new(FileStore::new(&path))
        .save("persisted", &user)
        .unwrap();

    let reopened = AuthSession::new(FileStore::new(&path));
    assert_eq!(reopened.token().as_deref(), Some("persisted"));
    assert_eq!(reopened.current_user(), Some(user));

    reopened.clear_auth().unwrap();
    assert!(!AuthSession::new(FileStore::new(&path)).is_authenticated());
}

#[test]
fn test_file_store_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = dir.path().join("nested").join("cache").join("session.json");
    let store = FileStore::new(&path);

    store.set(TOKEN_KEY, "value").unwrap();

    assert!(path.exists());
    assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("value"));
}

#[test]
fn test_file_store_missing_file_is_empty() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let store = FileStore::new(store_path(&dir));

    assert!(store.get(TOKEN_KEY).is_none());
    store.delete(TOKEN_KEY).unwrap();
    assert!(!store.path().exists());
}

#[test]
fn test_corrupt_file_reads_empty_and_is_replaced() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = store_path(&dir);
    fs::write(&path, "garbage{{").unwrap();
    let store = FileStore::new(&path);

    assert!(store.get(TOKEN_KEY).is_none());

    store.set(TOKEN_KEY, "fresh").unwrap();
    assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("fresh"));
}

#[test]
fn test_clear_auth_on_corrupt_file_succeeds() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = store_path(&dir);
    fs::write(&path, "[1, 2").unwrap();
    let session = AuthSession::new(FileStore::new(&path));

    session.clear_auth().unwrap();

    assert!(!session.is_authenticated());
}

// --- PostFilter ---

fn article(title: &str, category: Category, tags: &[&str], author: &str) -> Article {
    let now = Utc::now();
    Article {
        id: Uuid::new_v4(),
        title: title.to_string(),
        content: format!("All about {}", title.to_lowercase()),
        excerpt: String::new(),
        category,
        tags: tags
            .iter()
            .enumerate()
            .map(|(i, name)| Tag {
                id: i as i64 + 1,
                name: name.to_string(),
            })
            .collect(),
        author: Identity {
            name: author.to_string(),
            ..identity(Role::Teacher)
        },
        published: true,
        views: 0,
        likes: 0,
        created_at: now,
        updated_at: now,
    }
}

fn catalogue() -> Vec<Article> {
    vec![
        article("Ownership Basics", Category::Tutorial, &["rust", "beginner"], "Grace"),
        article("Async Runtimes", Category::Tech, &["rust", "async"], "Linus"),
        article("Census Data", Category::Dataset, &["csv"], "Grace"),
    ]
}

fn titles(posts: Vec<&Article>) -> Vec<&str> {
    posts.into_iter().map(|p| p.title.as_str()).collect()
}

#[test]
fn test_empty_filter_keeps_everything_in_order() {
    let posts = catalogue();
    assert_eq!(
        titles(PostFilter::new().apply(&posts)),
        vec!["Ownership Basics", "Async Runtimes", "Census Data"]
    );
}

#[test]
fn test_query_is_case_insensitive_across_fields() {
    let posts = catalogue();

    assert_eq!(titles(PostFilter::new().query("ASYNC").apply(&posts)), vec!["Async Runtimes"]);
    assert_eq!(
        titles(PostFilter::new().query("grace").apply(&posts)),
        vec!["Ownership Basics", "Census Data"]
    );
    assert_eq!(titles(PostFilter::new().query("census data").apply(&posts)), vec!["Census Data"]);
    assert_eq!(PostFilter::new().query("   ").apply(&posts).len(), 3);
}

#[test]
fn test_category_and_tag_criteria_combine() {
    let posts = catalogue();

    assert_eq!(
        titles(PostFilter::new().tag("rust").apply(&posts)),
        vec!["Ownership Basics", "Async Runtimes"]
    );
    assert_eq!(
        titles(PostFilter::new().tag("rust").category(Category::Tech).apply(&posts)),
        vec!["Async Runtimes"]
    );
    assert!(PostFilter::new().tag("csv").category(Category::Code).apply(&posts).is_empty());
    assert!(PostFilter::new().tag("Rust").apply(&posts).is_empty());
}
