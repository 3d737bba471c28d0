use std::{
    collections::HashSet,
    convert::Infallible,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Claims
///
/// Payload signed into every credential token. Only the subject is
/// authoritative; `iat` is informational. There is no `exp`: a token stays
/// valid for as long as the signing secret does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the id of the identity the token was issued to.
    pub sub: Uuid,
    /// Issued At (iat): seconds since the Unix epoch.
    pub iat: usize,
}

/// Verification
///
/// Outcome of checking a request's bearer token. A missing token and a token
/// that fails verification both become `Unverified`; callers never see why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified(Uuid),
    Unverified,
}

impl Verification {
    pub fn user_id(self) -> Option<Uuid> {
        match self {
            Verification::Verified(id) => Some(id),
            Verification::Unverified => None,
        }
    }

    pub fn is_verified(self) -> bool {
        matches!(self, Verification::Verified(_))
    }
}

/// TokenService
///
/// Signs and verifies credential tokens with an HMAC secret (HS256).
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// Shared handle stored in the application state.
pub type TokenState = Arc<TokenService>;

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Tokens carry no expiry, so `exp` must be neither required nor checked.
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs a token whose subject is `user_id`.
    pub fn issue(&self, user_id: Uuid) -> Result<String, ApiError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as usize)
            .unwrap_or_default();
        let claims = Claims { sub: user_id, iat };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("token signing failed: {e}")))
    }

    /// Checks the signature and decodes the subject. Never fails: anything
    /// that does not verify is `Unverified`.
    pub fn verify(&self, token: &str) -> Verification {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Verification::Verified(data.claims.sub),
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                Verification::Unverified
            }
        }
    }

    /// Verifies the bearer token carried by `headers`, if any.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Verification {
        match bearer_token(headers) {
            Some(token) => self.verify(token),
            None => Verification::Unverified,
        }
    }
}

/// Extracts `<token>` from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// MaybeAuthUser
///
/// Extractor for routes that are open to everyone but may personalise the
/// response for a verified caller. It never rejects.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Verification);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    TokenState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenState::from_ref(state);
        Ok(MaybeAuthUser(tokens.verify_headers(&parts.headers)))
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Extraction fails with
/// `ApiError::Unauthorized` (401) unless the bearer token verifies, so a
/// handler taking `AuthUser` can never run for an anonymous caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenState::from_ref(state);
        match tokens.verify_headers(&parts.headers) {
            Verification::Verified(id) => Ok(AuthUser { id }),
            Verification::Unverified => Err(ApiError::Unauthorized),
        }
    }
}
