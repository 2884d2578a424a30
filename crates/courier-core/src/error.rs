//! Caller-facing error returned by the request pipeline.

use chrono::{DateTime, Utc};

use crate::classify::{classify, ErrorKind};
use crate::failure::Failure;
use crate::retry::Endpoint;

/// Server messages at or above this many characters are replaced by the
/// kind's default message.
pub const MAX_SERVER_MESSAGE_CHARS: usize = 200;

impl ErrorKind {
    /// Message used by the pipeline when the server sent nothing usable.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network error. Please check your connection and try again.",
            ErrorKind::Validation => "Invalid request. Please check your input and try again.",
            ErrorKind::Authentication => "Authentication required. Please log in again.",
            ErrorKind::Authorization => "You do not have permission to perform this action.",
            ErrorKind::NotFound => "The requested resource was not found.",
            ErrorKind::Conflict => "Conflict. The resource already exists or is in use.",
            ErrorKind::Server => "Server error. Please try again later.",
            ErrorKind::Unknown => "An unexpected error occurred. Please try again.",
        }
    }

    /// Shorter wording used when presenting an error to the user.
    pub fn display_message(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Please check your input and try again.",
            ErrorKind::Authentication => "Please log in to continue.",
            other => other.default_message(),
        }
    }
}

/// Returns the server message if it is non-empty and short enough to show verbatim.
pub fn usable_server_message(message: Option<&str>) -> Option<&str> {
    message.filter(|m| !m.trim().is_empty() && m.chars().count() < MAX_SERVER_MESSAGE_CHARS)
}

/// Terminal failure of a pipeline execution.
///
/// Everything the presentation layer needs (status, request, timestamp) is
/// captured here at classification time; the value is never mutated after.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct NormalizedError {
    kind: ErrorKind,
    message: String,
    status_code: Option<u16>,
    status_text: Option<String>,
    server_message: Option<String>,
    is_network_error: bool,
    endpoint: Endpoint,
    attempts: u32,
    occurred_at: DateTime<Utc>,
    #[source]
    cause: Failure,
}

impl NormalizedError {
    /// Classifies `cause` once and resolves the message.
    pub fn from_failure(cause: Failure, endpoint: Endpoint, attempts: u32) -> Self {
        let kind = classify(&cause);
        Self::with_kind(kind, cause, endpoint, attempts)
    }

    fn with_kind(
        kind: ErrorKind,
        cause: Failure,
        endpoint: Endpoint,
        attempts: u32,
    ) -> Self {
        let server_message = usable_server_message(cause.server_message()).map(str::to_string);
        let message = server_message
            .clone()
            .unwrap_or_else(|| kind.default_message().to_string());
        Self {
            kind,
            message,
            status_code: cause.status_code(),
            status_text: cause.status_text().map(str::to_string),
            server_message,
            is_network_error: !cause.has_response(),
            endpoint,
            attempts,
            occurred_at: Utc::now(),
            cause,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    /// Server-supplied message, only if it passed the override rule.
    pub fn server_message(&self) -> Option<&str> {
        self.server_message.as_deref()
    }

    pub fn is_network_error(&self) -> bool {
        self.is_network_error
    }

    pub fn is_cancelled(&self) -> bool {
        self.cause.is_cancelled()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of dispatches performed before giving up.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn cause(&self) -> &Failure {
        &self.cause
    }
}
