//! Presentation adapter: turns a [`NormalizedError`] into a user-facing
//! message, a toast directive, and a structured log record.
//!
//! Everything is read from the error as captured at classification time, so
//! presenting the same error twice yields the same record.

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::classify::ErrorKind;
use crate::error::{usable_server_message, NormalizedError};

const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Destructive,
    Warning,
}

/// Display directive for a transient notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
    pub duration_ms: u64,
}

/// Structured diagnostic record for console inspection or log shipping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub message: String,
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub url: String,
    pub method: String,
    pub context: Option<String>,
    pub attempts: u32,
    /// RFC 3339 timestamp of classification.
    pub timestamp: String,
    pub extra: Map<String, Value>,
}

impl LogRecord {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub message: String,
    pub toast: Toast,
    pub log: LogRecord,
}

fn toast_title(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Network => "Connection problem",
        ErrorKind::Validation => "Invalid input",
        ErrorKind::Authentication => "Session expired",
        ErrorKind::Authorization => "Access denied",
        ErrorKind::NotFound => "Not found",
        ErrorKind::Conflict => "Conflict",
        ErrorKind::Server => "Server error",
        ErrorKind::Unknown => "Something went wrong",
    }
}

fn toast_variant(kind: ErrorKind) -> ToastVariant {
    match kind {
        ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Conflict => ToastVariant::Warning,
        _ => ToastVariant::Destructive,
    }
}

/// User-facing message: optional `"<context>: "` prefix, then the server
/// message if usable, else the kind's display default.
pub fn user_message(err: &NormalizedError, context: Option<&str>) -> String {
    let base = usable_server_message(err.server_message())
        .unwrap_or_else(|| err.kind().display_message());
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(ctx) => format!("{}: {}", ctx, base),
        None => base.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct Presenter {
    toast_duration: Duration,
    emit_logs: bool,
}

impl Default for Presenter {
    fn default() -> Self {
        Self {
            toast_duration: DEFAULT_TOAST_DURATION,
            emit_logs: true,
        }
    }
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_toast_duration(mut self, duration: Duration) -> Self {
        self.toast_duration = duration;
        self
    }

    /// Build presentations without emitting log events.
    pub fn silent(mut self) -> Self {
        self.emit_logs = false;
        self
    }

    pub fn present(
        &self,
        err: &NormalizedError,
        context: Option<&str>,
        extra: Map<String, Value>,
    ) -> Presentation {
        let message = user_message(err, context);
        let toast = Toast {
            title: toast_title(err.kind()).to_string(),
            description: message.clone(),
            variant: toast_variant(err.kind()),
            duration_ms: self.toast_duration.as_millis() as u64,
        };
        let log = self.log_record(err, &message, context, extra);
        if self.emit_logs {
            emit(&log);
        }
        Presentation {
            message,
            toast,
            log,
        }
    }

    /// Emit the log record for a terminal failure with no display context.
    pub fn report(&self, err: &NormalizedError) -> LogRecord {
        let log = self.log_record(err, err.message(), None, Map::new());
        if self.emit_logs {
            emit(&log);
        }
        log
    }

    fn log_record(
        &self,
        err: &NormalizedError,
        message: &str,
        context: Option<&str>,
        extra: Map<String, Value>,
    ) -> LogRecord {
        let endpoint = err.endpoint();
        LogRecord {
            message: message.to_string(),
            kind: err.kind(),
            status: err.status_code(),
            status_text: err.status_text().map(str::to_string),
            url: endpoint.url.clone(),
            method: endpoint.method.to_string(),
            context: context.map(str::to_string),
            attempts: err.attempts(),
            timestamp: err.occurred_at().to_rfc3339(),
            extra,
        }
    }
}

fn emit(log: &LogRecord) {
    let extra = Value::Object(log.extra.clone());
    match log.kind {
        ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Conflict => tracing::warn!(
            kind = %log.kind,
            status = ?log.status,
            status_text = ?log.status_text,
            method = %log.method,
            url = %log.url,
            context = ?log.context,
            attempts = log.attempts,
            timestamp = %log.timestamp,
            extra = %extra,
            "{}",
            log.message
        ),
        _ => tracing::error!(
            kind = %log.kind,
            status = ?log.status,
            status_text = ?log.status_text,
            method = %log.method,
            url = %log.url,
            context = ?log.context,
            attempts = log.attempts,
            timestamp = %log.timestamp,
            extra = %extra,
            "{}",
            log.message
        ),
    }
}
