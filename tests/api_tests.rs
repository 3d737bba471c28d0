use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use content_portal::{
    AppConfig, AppState, InMemoryRepository, PasswordHasher, TokenService, create_router,
    models::{Article, Identity, NewUser, Role},
    repository::Repository,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const TEST_JWT_SECRET: &str = "api-test-secret";

struct TestApp {
    router: Router,
    repo: Arc<InMemoryRepository>,
    tokens: Arc<TokenService>,
}

fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let tokens = Arc::new(TokenService::new(TEST_JWT_SECRET));
    let state = AppState {
        repo: repo.clone(),
        tokens: tokens.clone(),
        passwords: Arc::new(PasswordHasher::new(4).unwrap()),
        config: AppConfig::default(),
    };
    TestApp {
        router: create_router(state),
        repo,
        tokens,
    }
}

impl TestApp {
    async fn user(&self, name: &str, role: Role) -> (Identity, String) {
        let identity = self
            .repo
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: bcrypt::hash("password", 4).unwrap(),
                role,
                avatar_url: None,
            })
            .await
            .unwrap();
        let token = self.tokens.issue(identity.id).unwrap();
        (identity, token)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}

fn new_post(title: &str) -> Value {
    json!({
        "title": title,
        "content": "Some useful content",
        "category": "code",
        "tags": ["rust"]
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app();
    let (status, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// --- Public reads ---

#[tokio::test]
async fn test_list_posts_empty_is_empty_array() {
    let app = spawn_app();

    let (status, body) = app.send(Method::GET, "/posts", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_posts_newest_first_with_or_without_token() {
    let app = spawn_app();
    let (_, token) = app.user("Writer", Role::Teacher).await;
    for title in ["first", "second", "third"] {
        let (status, _) = app
            .send(Method::POST, "/posts", Some(&token), Some(new_post(title)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, anon) = app.send(Method::GET, "/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let posts: Vec<Article> = serde_json::from_value(anon).unwrap();
    let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["third", "second", "first"]);

    // A garbage token on a read is simply ignored.
    let (status, garbage) = app.send(Method::GET, "/posts", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(garbage.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_article_wire_format_is_camel_case() {
    let app = spawn_app();
    let (author, token) = app.user("Camel", Role::Student).await;
    let (_, created) = app
        .send(Method::POST, "/posts", Some(&token), Some(new_post("shape")))
        .await;

    for key in ["id", "title", "content", "excerpt", "category", "tags", "author", "published", "views", "likes", "createdAt", "updatedAt"] {
        assert!(created.get(key).is_some(), "missing field {key}");
    }
    assert_eq!(created["author"]["id"], json!(author.id));
    assert!(created["author"].get("password_hash").is_none());
    assert!(created["author"].get("passwordHash").is_none());
    assert_eq!(created["tags"][0]["name"], json!("rust"));
}

// --- Authentication gate ---

#[tokio::test]
async fn test_writes_without_token_are_unauthorized() {
    let app = spawn_app();
    let (_, token) = app.user("Owner", Role::Student).await;
    let (_, created) = app
        .send(Method::POST, "/posts", Some(&token), Some(new_post("target")))
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    let attempts = [
        (Method::POST, "/posts".to_string(), Some(new_post("anon"))),
        (Method::PUT, format!("/posts/{id}"), Some(json!({ "title": "x" }))),
        (Method::DELETE, format!("/posts/{id}"), None),
        (Method::POST, format!("/posts/{id}/like"), None),
        (Method::GET, "/me".to_string(), None),
    ];

    for (method, uri, body) in attempts {
        for token in [None, Some("garbage"), Some("")] {
            let (status, body) = app.send(method.clone(), &uri, token, body.clone()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri} with {token:?}");
            assert!(body["message"].is_string());
        }
    }

    // Nothing was written.
    let (_, posts) = app.send(Method::GET, "/posts", None, None).await;
    assert_eq!(posts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_token_from_other_secret_is_rejected() {
    let app = spawn_app();
    let (identity, _) = app.user("Forged", Role::Admin).await;
    let forged = TokenService::new("someone-elses-secret")
        .issue(identity.id)
        .unwrap();

    let (status, _) = app
        .send(Method::POST, "/posts", Some(&forged), Some(new_post("forged")))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_caller() {
    let app = spawn_app();
    let (identity, token) = app.user("Self", Role::Teacher).await;

    let (status, body) = app.send(Method::GET, "/me", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_value::<Identity>(body).unwrap(), identity);
}

// --- Credential issuer over HTTP ---

#[tokio::test]
async fn test_auth_endpoint_login_and_register() {
    let app = spawn_app();
    app.user("Known", Role::Teacher).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth",
            None,
            Some(json!({ "email": "known@example.com", "password": "password", "action": "login" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], json!("teacher"));
    assert!(body["token"].is_string());

    let (status, body) = app
        .send(
            Method::POST,
            "/auth",
            None,
            Some(json!({ "email": "fresh@example.com", "password": "pw", "action": "register", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    // Self-registration never grants a role.
    assert_eq!(body["user"]["role"], json!("student"));
}

#[tokio::test]
async fn test_auth_endpoint_error_statuses() {
    let app = spawn_app();
    app.user("Known", Role::Student).await;

    let (status, wrong_pw) = app
        .send(Method::POST, "/auth", None, Some(json!({ "email": "known@example.com", "password": "bad" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown) = app
        .send(Method::POST, "/auth", None, Some(json!({ "email": "who@example.com", "password": "bad" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw, unknown);

    let (status, body) = app
        .send(Method::POST, "/auth", None, Some(json!({ "email": "x@example.com" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = app
        .send(Method::POST, "/auth", None, Some(json!({ "email": "x@example.com", "password": "p", "action": "wipe" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// --- Ownership over HTTP ---

#[tokio::test]
async fn test_update_and_delete_ownership() {
    let app = spawn_app();
    let (_, owner) = app.user("Owner", Role::Student).await;
    let (_, stranger) = app.user("Stranger", Role::Teacher).await;
    let (_, admin) = app.user("Admin", Role::Admin).await;
    let (_, created) = app
        .send(Method::POST, "/posts", Some(&owner), Some(new_post("mine")))
        .await;
    let uri = format!("/posts/{}", created["id"].as_str().unwrap());

    let (status, _) = app
        .send(Method::PUT, &uri, Some(&stranger), Some(json!({ "title": "theirs" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&owner), Some(json!({ "title": "still mine" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], json!("still mine"));

    let (status, _) = app.send(Method::DELETE, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_like_and_view_counters() {
    let app = spawn_app();
    let (_, token) = app.user("Counter", Role::Student).await;
    let (_, created) = app
        .send(Method::POST, "/posts", Some(&token), Some(new_post("counted")))
        .await;
    let id = created["id"].as_str().unwrap();

    let (status, liked) = app
        .send(Method::POST, &format!("/posts/{id}/like"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(liked["likes"], json!(1));

    let (_, viewed) = app.send(Method::GET, &format!("/posts/{id}"), None, None).await;
    assert_eq!(viewed["views"], json!(1));
    assert_eq!(viewed["likes"], json!(1));
}

// --- Request validation and fallbacks ---

#[tokio::test]
async fn test_malformed_post_body_is_bad_request() {
    let app = spawn_app();
    let (_, token) = app.user("Sloppy", Role::Student).await;

    let (status, body) = app
        .send(Method::POST, "/posts", Some(&token), Some(json!({ "title": "no category" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = app
        .send(
            Method::POST,
            "/posts",
            Some(&token),
            Some(json!({ "title": "t", "content": "c", "category": "poetry" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_post_id_is_rejected() {
    let app = spawn_app();
    let (_, token) = app.user("Typo", Role::Student).await;

    let (status, body) = app.send(Method::GET, "/posts/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid path parameter"));

    for (method, uri) in [
        (Method::DELETE, "/posts/not-a-uuid"),
        (Method::POST, "/posts/not-a-uuid/like"),
    ] {
        let (status, body) = app.send(method, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn test_deleted_account_token_cannot_like() {
    let app = spawn_app();
    let (_, author) = app.user("Author", Role::Teacher).await;
    let (_, created) = app
        .send(Method::POST, "/posts", Some(&author), Some(new_post("liked")))
        .await;
    let id = created["id"].as_str().unwrap();
    // Signed correctly, but for an identity that was never stored.
    let orphan = app.tokens.issue(uuid::Uuid::new_v4()).unwrap();

    let (status, body) = app
        .send(Method::POST, &format!("/posts/{id}/like"), Some(&orphan), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let (_, post) = app.send(Method::GET, &format!("/posts/{id}"), None, None).await;
    assert_eq!(post["likes"], json!(0));
}

#[tokio::test]
async fn test_unsupported_method_is_405_with_message() {
    let app = spawn_app();

    let (status, body) = app.send(Method::PATCH, "/posts", None, None).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({ "message": "Method not supported" }));

    let (status, _) = app.send(Method::GET, "/auth", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_route_is_404_with_message() {
    let app = spawn_app();

    let (status, body) = app.send(Method::GET, "/nowhere", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "Resource not found" }));
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let app = spawn_app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
