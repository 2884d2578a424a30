//! Credential provider: attaches the bearer token and handles invalidation.

use std::sync::Arc;

use crate::session::Session;
use crate::transport::Request;

/// Default route the client is sent to when its session is invalidated.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Navigation side effect run after a session is invalidated.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, route: &str);
}

/// Redirect that only records the event in the log. Used by headless callers
/// (the CLI) that have no navigation surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self, route: &str) {
        tracing::warn!(route, "session invalidated; log in again");
    }
}

/// The only component allowed to clear the [`Session`].
#[derive(Clone)]
pub struct CredentialProvider {
    session: Session,
    redirect: Arc<dyn LoginRedirect>,
    login_route: String,
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("authenticated", &self.session.is_authenticated())
            .field("login_route", &self.login_route)
            .finish()
    }
}

impl CredentialProvider {
    pub fn new(session: Session, redirect: Arc<dyn LoginRedirect>) -> Self {
        Self {
            session,
            redirect,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
        }
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Sets `Authorization: Bearer <token>` when a token is present; otherwise
    /// the request goes out without credentials.
    pub fn attach(&self, mut request: Request) -> Request {
        if let Some(token) = self.session.token() {
            request.set_header("Authorization", format!("Bearer {}", token));
        }
        request
    }

    /// Clears the session and navigates to the login route after `sent` was
    /// rejected with a 401. Returns false (and does nothing) if another request
    /// already invalidated this session, or if the session has moved on to a
    /// token other than the one `sent` carried.
    pub fn on_auth_invalidated(&self, sent: &Request) -> bool {
        if !self.session.invalidate(bearer_token(sent)) {
            tracing::debug!(url = %sent.url, "401 for a session that is already invalidated or replaced");
            return false;
        }
        tracing::info!(route = %self.login_route, "clearing session after authentication failure");
        self.redirect.redirect_to_login(&self.login_route);
        true
    }
}

/// Token carried in the request's `Authorization: Bearer` header, if any.
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .header("Authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
}
