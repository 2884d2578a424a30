//! Process-wide session: current auth token and cached user identity.
//!
//! Passed explicitly as a cloneable handle. Readers take a snapshot of the
//! token per request; only the credential provider clears it on a 401.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Cached identity of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<UserIdentity>,
    /// Latched by the first invalidation; reset by the next login.
    invalidated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session already holding a token (e.g. restored by the caller).
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.login(token, None);
        session
    }

    pub fn login(&self, token: impl Into<String>, user: Option<UserIdentity>) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.token = Some(token.into());
        state.user = user;
        state.invalidated = false;
    }

    /// User-initiated logout. Does not trigger a login redirect.
    pub fn logout(&self) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.token = None;
        state.user = None;
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .is_some()
    }

    /// Clears token and identity if the session still holds `sent_token`, the
    /// token the rejected request carried. Returns true only for the first such
    /// call since the last login, so concurrent 401s redirect once and a 401
    /// for a token that has since been replaced leaves the new login alone.
    pub(crate) fn invalidate(&self, sent_token: Option<&str>) -> bool {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.invalidated || state.token.as_deref() != sent_token {
            return false;
        }
        state.token = None;
        state.user = None;
        state.invalidated = true;
        true
    }
}
