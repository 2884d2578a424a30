//! The named stages of one pipeline execution:
//! prepare → attach credentials → dispatch → retry decision → classify.
//!
//! Each stage is a small method so it can be exercised on its own; the loop
//! in `execute` only sequences them.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{RequestPipeline, RequestSpec};
use crate::error::NormalizedError;
use crate::failure::{Failure, TransportErrorKind};
use crate::retry::{Attempt, Endpoint, RetryDecision, RetryPolicy};
use crate::transport::{Request, Response, Transport};

impl<T: Transport> RequestPipeline<T> {
    /// Resolves the URL against the base and applies default headers and timeout.
    pub(crate) fn prepare(&self, spec: &RequestSpec) -> Result<Request, (Endpoint, Failure)> {
        let url = match self.resolve_url(&spec.path) {
            Ok(url) => url,
            Err(e) => {
                let endpoint = Endpoint {
                    method: spec.method,
                    url: spec.path.clone(),
                };
                let failure = Failure::invalid_request(format!("invalid URL: {}", e));
                return Err((endpoint, failure));
            }
        };

        let mut request = Request {
            method: spec.method,
            url: url.to_string(),
            headers: Vec::new(),
            body: spec.body.clone(),
            timeout: spec.timeout.unwrap_or(self.timeout),
        };
        for (name, value) in self.default_headers.iter().chain(spec.headers.iter()) {
            request.set_header(name, value.clone());
        }
        Ok(request)
    }

    pub(crate) fn resolve_url(&self, path: &str) -> Result<Url, url::ParseError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path);
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
    }

    /// Stage 1: add the bearer token, if any.
    pub(crate) fn attach_credentials(&self, request: &Request) -> Request {
        self.credentials.attach(request.clone())
    }

    /// Stage 2: one dispatch, abandoned early if `cancel` fires.
    pub(crate) async fn dispatch(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response, Failure> {
        if cancel.is_cancelled() {
            return Err(Failure::cancelled());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Failure::cancelled()),
            result = self.transport.dispatch(request) => result,
        }
    }

    /// Stage 3: decide whether the attempt's failure is worth another dispatch.
    pub(crate) fn retry_decision(&self, policy: &RetryPolicy, attempt: &Attempt) -> RetryDecision {
        policy.decide(attempt)
    }

    /// Waits out a backoff delay. Returns false if cancelled meanwhile.
    pub(crate) async fn backoff(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Stage 4: classify the terminal failure exactly once.
    pub(crate) fn classify(&self, attempt: Attempt) -> NormalizedError {
        let count = attempt.count();
        let endpoint = attempt.endpoint().clone();
        let failure = attempt
            .into_failure()
            .unwrap_or_else(|| Failure::transport(TransportErrorKind::Other, "no outcome recorded"));
        let err = NormalizedError::from_failure(failure, endpoint, count);
        if let Some(presenter) = &self.presenter {
            presenter.report(&err);
        }
        err
    }
}
