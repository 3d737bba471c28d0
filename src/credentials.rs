//! Credential issuance: password verification and token minting for `POST /auth`.
//!
//! Issuance is stateless. Nothing is recorded on success; the returned token is
//! the only evidence of the login.

use std::sync::Arc;

use crate::{
    auth::TokenService,
    error::ApiError,
    models::{AuthResponse, NewUser, Role},
    repository::{Repository, RepositoryError},
};

/// PasswordHasher
///
/// bcrypt hashing with a fixed work factor. Holds a decoy hash so that a login
/// for an unknown email costs the same bcrypt verification as a wrong password.
pub struct PasswordHasher {
    cost: u32,
    decoy_hash: String,
}

pub type PasswordState = Arc<PasswordHasher>;

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, bcrypt::BcryptError> {
        let decoy_hash = bcrypt::hash("decoy-password-never-matches", cost)?;
        Ok(Self { cost, decoy_hash })
    }

    /// Hashes `password` on the blocking pool.
    pub async fn hash(&self, password: &str) -> Result<String, ApiError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await?
            .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
    }

    /// Compares `password` against `stored_hash`, or against the decoy when
    /// there is no stored hash. A malformed stored hash counts as a mismatch.
    pub async fn verify(&self, password: &str, stored_hash: Option<&str>) -> Result<bool, ApiError> {
        let known = stored_hash.is_some();
        let hash = stored_hash.unwrap_or(&self.decoy_hash).to_owned();
        let password = password.to_owned();

        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
        Ok(known
            && matched.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored password hash could not be parsed");
                false
            }))
    }
}

/// Validates the shape of an email/password pair taken from a request body.
fn require_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    Ok(())
}

/// issue
///
/// Looks up the identity by `email`, verifies `password` and signs a token for
/// it. Unknown email and wrong password both yield `InvalidCredentials`.
pub async fn issue(
    repo: &dyn Repository,
    passwords: &PasswordHasher,
    tokens: &TokenService,
    email: &str,
    password: &str,
) -> Result<AuthResponse, ApiError> {
    require_credentials(email, password)?;

    let stored = repo.find_user_by_email(email).await?;
    let matched = passwords
        .verify(password, stored.as_ref().map(|s| s.password_hash.as_str()))
        .await?;

    let user = match stored {
        Some(stored) if matched => stored.identity,
        _ => {
            tracing::warn!("login rejected: invalid credentials");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let token = tokens.issue(user.id)?;
    tracing::info!(user_id = %user.id, "login succeeded");
    Ok(AuthResponse { token, user })
}

/// register
///
/// Creates a `student` identity and returns a token for it. The role is never
/// taken from the request.
pub async fn register(
    repo: &dyn Repository,
    passwords: &PasswordHasher,
    tokens: &TokenService,
    email: &str,
    password: &str,
    name: Option<&str>,
) -> Result<AuthResponse, ApiError> {
    require_credentials(email, password)?;

    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| email.split('@').next())
        .unwrap_or(email)
        .to_string();

    let password_hash = passwords.hash(password).await?;
    let user = repo
        .create_user(NewUser {
            name,
            email: email.to_string(),
            password_hash,
            role: Role::Student,
            avatar_url: None,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                ApiError::Conflict("An account with this email already exists".to_string())
            }
            other => other.into(),
        })?;

    let token = tokens.issue(user.id)?;
    tracing::info!(user_id = %user.id, "account registered");
    Ok(AuthResponse { token, user })
}
