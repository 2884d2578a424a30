//! Request pipeline: the orchestrator callers go through for every HTTP call.
//!
//! # Data Flow
//! ```text
//! RequestSpec
//!     → prepare (base URL, default headers, timeout)
//!     → attach credentials (bearer token from Session)
//!     → dispatch (Transport, cancellable)
//!     → on failure:
//!         401            → invalidate session, terminal
//!         retry decision → backoff, dispatch again
//!         otherwise      → classify, terminal
//!     → Response | NormalizedError
//! ```
//!
//! Attempts within one execution are strictly sequential. Separate executions
//! share nothing but the Session.

mod spec;
mod stages;

pub use spec::RequestSpec;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::CourierConfig;
use crate::credentials::CredentialProvider;
use crate::error::NormalizedError;
use crate::failure::{Failure, StatusFailure};
use crate::present::Presenter;
use crate::retry::{Attempt, Endpoint, RetryDecision, RetryPolicy};
use crate::transport::{CurlTransport, Method, Response, Transport, DEFAULT_TIMEOUT};

pub struct RequestPipeline<T: Transport = CurlTransport> {
    transport: T,
    credentials: CredentialProvider,
    base_url: Url,
    default_headers: Vec<(String, String)>,
    timeout: Duration,
    retry: RetryPolicy,
    presenter: Option<Presenter>,
}

impl<T: Transport> RequestPipeline<T> {
    /// Pipeline with the default policy: 15s timeout, 3 attempts, 1s base
    /// delay, `Content-Type: application/json`, terminal failures logged.
    pub fn new(
        transport: T,
        credentials: CredentialProvider,
        base_url: &str,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            transport,
            credentials,
            base_url: Url::parse(base_url)?,
            default_headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            presenter: Some(Presenter::default()),
        })
    }

    /// Pipeline for the build's environment, with timeout, retry policy and
    /// login route taken from `cfg`.
    pub fn from_config(
        cfg: &CourierConfig,
        transport: T,
        credentials: CredentialProvider,
    ) -> anyhow::Result<Self> {
        let credentials = credentials.with_login_route(cfg.login_route.clone());
        let pipeline = Self::new(transport, credentials, cfg.base_url())?
            .with_timeout(cfg.timeout())
            .with_retry_policy(cfg.retry_policy());
        Ok(pipeline)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.default_headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.default_headers.push((name.to_string(), value));
        self
    }

    /// Presenter used to log terminal failures; `None` disables that log line.
    pub fn with_presenter(mut self, presenter: Option<Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn credentials(&self) -> &CredentialProvider {
        &self.credentials
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, spec: RequestSpec) -> Result<Response, NormalizedError> {
        self.execute_with_cancel(spec, &CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), but `cancel` interrupts an in-flight
    /// dispatch or backoff wait. A cancelled execution is never retried.
    pub async fn execute_with_cancel(
        &self,
        spec: RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<Response, NormalizedError> {
        self.run(spec, cancel).await.map(|(response, _)| response)
    }

    /// Executes and decodes a JSON success body. A body that does not decode
    /// is reported as an Unknown-kind error carrying the response status.
    pub async fn execute_json<R: DeserializeOwned>(
        &self,
        spec: RequestSpec,
    ) -> Result<R, NormalizedError> {
        let (response, mut attempt) = self.run(spec, &CancellationToken::new()).await?;
        match response.json() {
            Ok(value) => Ok(value),
            Err(e) => {
                attempt.record_failure(Failure::Status(StatusFailure {
                    status: response.status,
                    status_text: response.status_text.clone(),
                    server_message: None,
                    body: format!("invalid response body: {}", e),
                }));
                Err(self.classify(attempt))
            }
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response, NormalizedError> {
        self.execute(RequestSpec::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, NormalizedError> {
        self.execute(RequestSpec::delete(path)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, NormalizedError> {
        self.execute(self.json_spec(Method::Post, path, body)?).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, NormalizedError> {
        self.execute(self.json_spec(Method::Put, path, body)?).await
    }

    pub async fn patch_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, NormalizedError> {
        self.execute(self.json_spec(Method::Patch, path, body)?).await
    }

    fn json_spec<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<RequestSpec, NormalizedError> {
        RequestSpec::json(method, path, body).map_err(|e| {
            let endpoint = Endpoint {
                method,
                url: self
                    .resolve_url(path)
                    .map(String::from)
                    .unwrap_or_else(|_| path.to_string()),
            };
            let mut attempt = Attempt::new(endpoint, &self.retry);
            attempt.record_failure(Failure::invalid_request(format!("request body: {}", e)));
            self.classify(attempt)
        })
    }

    async fn run(
        &self,
        spec: RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<(Response, Attempt), NormalizedError> {
        let policy = spec.retry.unwrap_or(self.retry);
        let request = match self.prepare(&spec) {
            Ok(request) => request,
            Err((endpoint, failure)) => {
                let mut attempt = Attempt::new(endpoint, &policy);
                attempt.record_failure(failure);
                return Err(self.classify(attempt));
            }
        };
        let endpoint = Endpoint {
            method: request.method,
            url: request.url.clone(),
        };
        let mut attempt = Attempt::new(endpoint, &policy);

        loop {
            let outgoing = self.attach_credentials(&request);
            attempt.begin_dispatch();
            tracing::debug!(
                endpoint = %attempt.endpoint(),
                attempt = attempt.count(),
                max_attempts = attempt.max_attempts(),
                "dispatching request"
            );

            let failure = match self.dispatch(&outgoing, cancel).await {
                Ok(response) => return Ok((response, attempt)),
                Err(failure) => failure,
            };

            if failure.status_code() == Some(401) {
                self.credentials.on_auth_invalidated(&outgoing);
                attempt.record_failure(failure);
                return Err(self.classify(attempt));
            }

            attempt.record_failure(failure);
            match self.retry_decision(&policy, &attempt) {
                RetryDecision::NoRetry => return Err(self.classify(attempt)),
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        endpoint = %attempt.endpoint(),
                        attempt = attempt.count(),
                        delay_ms = delay.as_millis() as u64,
                        error = %attempt.failure().map(ToString::to_string).unwrap_or_default(),
                        "transient failure, retrying"
                    );
                    if !self.backoff(delay, cancel).await {
                        attempt.record_failure(Failure::cancelled());
                        return Err(self.classify(attempt));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
