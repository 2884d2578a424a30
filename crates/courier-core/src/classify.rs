//! Classify a failed dispatch into one of a closed set of error kinds.
//!
//! The same table is used by the request pipeline and by any higher-level
//! handler that only holds a status code, so both always agree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::failure::Failure;

/// Classification of a terminal failure. Exhaustive and mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response was received (connection failure, timeout, cancellation).
    Network,
    /// 400 or 422.
    Validation,
    /// 401.
    Authentication,
    /// 403.
    Authorization,
    /// 404.
    NotFound,
    /// 409.
    Conflict,
    /// 500, 502, 503, 504.
    Server,
    /// Any other status.
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Network,
        ErrorKind::Validation,
        ErrorKind::Authentication,
        ErrorKind::Authorization,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::Server,
        ErrorKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Server => "server",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify by status alone; `None` means no response was received.
pub fn classify_status(status: Option<u16>) -> ErrorKind {
    let Some(code) = status else {
        return ErrorKind::Network;
    };
    match code {
        400 | 422 => ErrorKind::Validation,
        401 => ErrorKind::Authentication,
        403 => ErrorKind::Authorization,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        500 | 502 | 503 | 504 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    }
}

/// Classify a failure descriptor into an ErrorKind.
pub fn classify(failure: &Failure) -> ErrorKind {
    classify_status(failure.status_code())
}
