//! Resilient API client core.
//!
//! Every HTTP call goes through [`RequestPipeline`]: credentials are attached
//! from the shared [`Session`], transient failures are retried with
//! exponential backoff, and terminal failures come back as a
//! [`NormalizedError`] with a stable [`ErrorKind`].

pub mod classify;
pub mod config;
pub mod credentials;
pub mod error;
pub mod failure;
pub mod logging;
pub mod pipeline;
pub mod present;
pub mod retry;
pub mod session;
pub mod transport;

pub use classify::{classify, classify_status, ErrorKind};
pub use credentials::{CredentialProvider, LogRedirect, LoginRedirect};
pub use error::NormalizedError;
pub use failure::Failure;
pub use pipeline::{RequestPipeline, RequestSpec};
pub use present::{Presentation, Presenter};
pub use retry::RetryPolicy;
pub use session::{Session, UserIdentity};
pub use transport::{CurlTransport, Method, Response, Transport};
pub use tokio_util::sync::CancellationToken;
