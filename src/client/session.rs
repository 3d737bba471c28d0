use super::store::{KeyValueStore, StoreError};
use crate::models::{Identity, Role};

/// Cache key holding the opaque credential token.
pub const TOKEN_KEY: &str = "token";
/// Cache key holding the serialized `Identity`.
pub const USER_KEY: &str = "user";

/// AuthSession
///
/// Derives login state and permissions from the local cache alone, with no
/// network calls. Malformed cache contents never panic: they read as "no
/// user", which denies every permission.
pub struct AuthSession<S> {
    store: S,
}

impl<S: KeyValueStore> AuthSession<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The cached token, if any. A blank value counts as absent.
    pub fn token(&self) -> Option<String> {
        self.store
            .get(TOKEN_KEY)
            .filter(|token| !token.trim().is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// The cached identity, or `None` when absent or unparseable (including an
    /// unknown role name).
    pub fn current_user(&self) -> Option<Identity> {
        let raw = self.store.get(USER_KEY)?;
        match serde_json::from_str::<Identity>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed cached user");
                None
            }
        }
    }

    /// True iff a cached user exists whose role ranks at least `required`.
    pub fn has_permission(&self, required: Role) -> bool {
        self.current_user()
            .is_some_and(|user| user.role.satisfies(required))
    }

    /// Same as [`has_permission`](Self::has_permission) for a role given by
    /// name. Unknown names are denied.
    pub fn has_permission_named(&self, required: &str) -> bool {
        match required.parse::<Role>() {
            Ok(role) => self.has_permission(role),
            Err(_) => false,
        }
    }

    /// Caches a freshly issued token together with its identity.
    pub fn save(&self, token: &str, user: &Identity) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(user)?;
        self.store.set(USER_KEY, &serialized)?;
        self.store.set(TOKEN_KEY, token)
    }

    /// Removes token and identity. Safe to call when already logged out.
    ///
    /// Both deletes are always attempted; the first failure is returned.
    pub fn clear_auth(&self) -> Result<(), StoreError> {
        let token = self.store.delete(TOKEN_KEY);
        let user = self.store.delete(USER_KEY);
        token.and(user)
    }
}
