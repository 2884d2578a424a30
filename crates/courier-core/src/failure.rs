//! Typed failure descriptor for a single dispatch.
//!
//! Populated once at the transport boundary (status, server message, whether a
//! response existed at all) and consumed everywhere else through this shape,
//! so the classifier and the retry policy never have to probe raw payloads.

use std::fmt;

use crate::transport::parse;

/// Why no response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Operation timed out (connect or whole request).
    Timeout,
    /// Network-level failure (connection refused/reset, DNS, etc.).
    Connection,
    /// The caller cancelled the request.
    Cancelled,
    /// The request could not be built (malformed URL, unserializable body).
    InvalidRequest,
    /// Any other failure before a status line arrived.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connection => "connection",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::InvalidRequest => "invalid request",
            TransportErrorKind::Other => "transport",
        };
        f.write_str(s)
    }
}

/// A failure where no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

/// A response arrived but its status was not 2xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFailure {
    pub status: u16,
    /// Reason phrase from the status line (e.g. "Not Found"); may be empty.
    pub status_text: String,
    /// Structured message field from a JSON error body, if the server sent one.
    pub server_message: Option<String>,
    /// Raw response body, kept for diagnostics only.
    pub body: String,
}

impl StatusFailure {
    /// Builds the descriptor, extracting the server message from `body` once.
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let server_message = parse::server_message(&body);
        Self {
            status,
            status_text: status_text.into(),
            server_message,
            body,
        }
    }
}

/// Outcome of a failed dispatch: either no response, or a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Transport(TransportError),
    Status(StatusFailure),
}

impl Failure {
    pub fn transport(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Failure::Transport(TransportError {
            kind,
            detail: detail.into(),
        })
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::transport(TransportErrorKind::Timeout, detail)
    }

    pub fn connection(detail: impl Into<String>) -> Self {
        Self::transport(TransportErrorKind::Connection, detail)
    }

    pub fn cancelled() -> Self {
        Self::transport(TransportErrorKind::Cancelled, "request cancelled")
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::transport(TransportErrorKind::InvalidRequest, detail)
    }

    pub fn status(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Failure::Status(StatusFailure::new(status, status_text, body))
    }

    /// HTTP status, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Failure::Status(s) => Some(s.status),
            Failure::Transport(_) => None,
        }
    }

    pub fn has_response(&self) -> bool {
        matches!(self, Failure::Status(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Failure::Transport(TransportError {
                kind: TransportErrorKind::Timeout,
                ..
            })
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Failure::Transport(TransportError {
                kind: TransportErrorKind::Cancelled,
                ..
            })
        )
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Failure::Transport(TransportError {
                kind: TransportErrorKind::InvalidRequest,
                ..
            })
        )
    }

    pub fn status_text(&self) -> Option<&str> {
        match self {
            Failure::Status(s) if !s.status_text.is_empty() => Some(&s.status_text),
            _ => None,
        }
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            Failure::Status(s) => s.server_message.as_deref(),
            Failure::Transport(_) => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Transport(e) => write!(f, "{}", e),
            Failure::Status(s) if s.status_text.is_empty() => write!(f, "HTTP {}", s.status),
            Failure::Status(s) => write!(f, "HTTP {} {}", s.status, s.status_text),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Failure::Transport(e) => Some(e),
            Failure::Status(_) => None,
        }
    }
}
