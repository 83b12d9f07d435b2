// src/config.rs

use crate::error::ConfigError;
use crate::logging::PROJECT_NAME;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_REMOTE_URL: &str = "https://mcp.attck-deploy.net/api/run";
pub const DEFAULT_REQUEST_SOURCE: &str = "vanguard-rs-gateway";
pub const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/dirb/common.txt";
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Process-wide values the Argument Formatter needs but the request does not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterDefaults {
    pub wordlist: String,
}

impl Default for FormatterDefaults {
    fn default() -> Self {
        Self {
            wordlist: DEFAULT_WORDLIST.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub remote_url: String,
    pub request_source: String,
    pub remote_timeout: Duration,
    /// Largest inbound request body accepted.
    pub max_request_bytes: usize,
    /// Largest reply read from the remote execution service.
    pub max_response_bytes: usize,
    pub formatter: FormatterDefaults,
}

impl Settings {
    /// Reads `<CRATE>_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| {
            let key = format!("{}_{}", PROJECT_NAME.as_str(), suffix);
            let value = lookup(&key).filter(|v| !v.trim().is_empty());
            (key, value)
        };

        let (key, value) = read("BIND_ADDR");
        let raw = value.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw
            .parse::<SocketAddr>()
            .map_err(|e| invalid(&key, &raw, e.to_string()))?;

        let (key, value) = read("REMOTE_URL");
        let remote_url = value.unwrap_or_else(|| DEFAULT_REMOTE_URL.to_string());
        url::Url::parse(&remote_url).map_err(|e| invalid(&key, &remote_url, e.to_string()))?;

        let (_, value) = read("REQUEST_SOURCE");
        let request_source = value.unwrap_or_else(|| DEFAULT_REQUEST_SOURCE.to_string());

        let (_, value) = read("WORDLIST");
        let wordlist = value.unwrap_or_else(|| DEFAULT_WORDLIST.to_string());

        let (key, value) = read("REMOTE_TIMEOUT_SECS");
        let timeout_secs = positive(&key, value, DEFAULT_REMOTE_TIMEOUT_SECS)?;

        let (key, value) = read("MAX_REQUEST_BYTES");
        let max_request_bytes = positive(&key, value, DEFAULT_MAX_REQUEST_BYTES)?;

        let (key, value) = read("MAX_RESPONSE_BYTES");
        let max_response_bytes = positive(&key, value, DEFAULT_MAX_RESPONSE_BYTES)?;

        let settings = Self {
            bind_addr,
            remote_url,
            request_source,
            remote_timeout: Duration::from_secs(timeout_secs),
            max_request_bytes,
            max_response_bytes,
            formatter: FormatterDefaults { wordlist },
        };
        debug!(?settings, "Configuration loaded.");
        Ok(settings)
    }
}

/// Parses a non-zero integer, falling back to `default` when unset.
fn positive<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(n) if n == T::default() => Err(invalid(key, &raw, "must be greater than zero".into())),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(key, &raw, e.to_string())),
    }
}

fn invalid(key: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}
