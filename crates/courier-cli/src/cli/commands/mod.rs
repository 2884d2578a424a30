//! CLI command handlers. Each command is in its own file.

mod classify;
mod config;
mod request;

pub use classify::run_classify;
pub use config::run_config;
pub use request::run_request;

#[cfg(test)]
pub(crate) use request::{build_spec, parse_header};
