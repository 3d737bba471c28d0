use reqwest::{Client, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use super::{
    session::AuthSession,
    store::{KeyValueStore, StoreError},
};
use crate::{
    error::ErrorBody,
    models::{Article, AuthRequest, AuthResponse, CreateArticleRequest, Identity},
};

/// ClientError
///
/// What a UI needs to tell the user. Transport failures carry a generic,
/// retry-suggesting message; nothing is retried automatically.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error, please check your connection and try again")]
    Network(#[source] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected response from the server, please try again")]
    Decode(#[source] reqwest::Error),
    #[error("Could not update the local session: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// ApiClient
///
/// HTTP client for the content API. It attaches the cached bearer token when
/// there is one and otherwise sends the request as-is: the server, not the
/// client, decides whether a write is allowed.
pub struct ApiClient<S> {
    http: Client,
    base_url: String,
    session: AuthSession<S>,
}

impl<S: KeyValueStore> ApiClient<S> {
    pub fn new(base_url: impl Into<String>, store: S) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: AuthSession::new(store),
        }
    }

    pub fn session(&self) -> &AuthSession<S> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await.map_err(ClientError::Network)?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string(),
            };
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        response.json::<T>().await.map_err(ClientError::Decode)
    }

    async fn authenticate(&self, body: AuthRequest) -> Result<Identity, ClientError> {
        let request = self.http.post(self.url("/auth")).json(&body);
        let AuthResponse { token, user } = self.send(request).await?;
        self.session.save(&token, &user)?;
        tracing::debug!(user_id = %user.id, "session stored");
        Ok(user)
    }

    /// Logs in and caches token and identity together.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        self.authenticate(AuthRequest {
            email: email.to_string(),
            password: password.to_string(),
            action: Some("login".to_string()),
            name: None,
        })
        .await
    }

    /// Registers a new account and caches its session.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Identity, ClientError> {
        self.authenticate(AuthRequest {
            email: email.to_string(),
            password: password.to_string(),
            action: Some("register".to_string()),
            name: name.map(str::to_string),
        })
        .await
    }

    /// Forgets the local session. The server keeps no session to revoke.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session.clear_auth()?;
        Ok(())
    }

    pub async fn list_posts(&self) -> Result<Vec<Article>, ClientError> {
        self.send(self.authorized(self.http.get(self.url("/posts"))))
            .await
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Article, ClientError> {
        self.send(self.authorized(self.http.get(self.url(&format!("/posts/{id}")))))
            .await
    }

    pub async fn create_post(&self, post: &CreateArticleRequest) -> Result<Article, ClientError> {
        self.send(self.authorized(self.http.post(self.url("/posts")).json(post)))
            .await
    }

    pub async fn like_post(&self, id: Uuid) -> Result<Article, ClientError> {
        self.send(self.authorized(self.http.post(self.url(&format!("/posts/{id}/like")))))
            .await
    }
}
