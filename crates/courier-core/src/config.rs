use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::DEFAULT_LOGIN_ROUTE;
use crate::retry::RetryPolicy;
use crate::transport::DEFAULT_TIMEOUT;

/// Build-time environment flag selecting the base URL.
const BUILD_ENV: Option<&str> = option_env!("COURIER_ENV");

/// Which API deployment requests are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// `COURIER_ENV=production` at build time selects production; anything
    /// else (or unset) selects development.
    pub fn current() -> Self {
        Self::from_flag(BUILD_ENV)
    }

    fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of dispatches per request (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Ceiling on a single backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let p = RetryPolicy::default();
        Self {
            max_attempts: p.max_attempts,
            base_delay_ms: p.base_delay.as_millis() as u64,
            max_delay_ms: p.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Global configuration loaded from `~/.config/courier/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// API base URL used by production builds.
    pub production_base_url: String,
    /// API base URL used by every other build.
    pub development_base_url: String,
    /// Per-dispatch timeout in milliseconds.
    pub timeout_ms: u64,
    /// Route the client is sent to after an authentication failure.
    pub login_route: String,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            production_base_url: "https://api.example.com/api".to_string(),
            development_base_url: "http://localhost:8080/api".to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            retry: None,
        }
    }
}

impl CourierConfig {
    pub fn base_url_for(&self, env: Environment) -> &str {
        match env {
            Environment::Production => &self.production_base_url,
            Environment::Development => &self.development_base_url,
        }
    }

    /// Base URL for the environment this binary was built for.
    pub fn base_url(&self) -> &str {
        self.base_url_for(Environment::current())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("courier")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CourierConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CourierConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from(&path)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<CourierConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: CourierConfig = toml::from_str(&data)?;
    Ok(cfg)
}
