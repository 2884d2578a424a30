//! Retry and backoff policy.
//!
//! Decides, per failed attempt, whether the request pipeline should dispatch
//! again and how long to wait first. Re-dispatching itself is owned by the
//! pipeline.

mod attempt;
mod policy;

pub use attempt::{Attempt, Endpoint};
pub use policy::{RetryDecision, RetryPolicy};
