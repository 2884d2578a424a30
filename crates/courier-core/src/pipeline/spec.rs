//! Caller-side description of a request.

use serde::Serialize;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::transport::Method;

/// What the caller wants sent. `path` is joined onto the pipeline's base URL
/// unless it is already an absolute `http(s)://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Per call site retry override; the pipeline default is used when `None`.
    pub retry: Option<RetryPolicy>,
    /// Per call site timeout override.
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            retry: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Request with a JSON-serialized body.
    pub fn json<T: Serialize + ?Sized>(
        method: Method,
        path: impl Into<String>,
        body: &T,
    ) -> serde_json::Result<Self> {
        let mut spec = Self::new(method, path);
        spec.body = Some(serde_json::to_vec(body)?);
        Ok(spec)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
