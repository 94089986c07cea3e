//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use registration::{Endpoint, FanOut, RetryPolicy};

const DEFAULT_AUDIT_FILE: &str = "data/users.json";

/// Names the two downstream services go by in logs and failure messages.
pub const DOWNSTREAM_A: &str = "service-a";
pub const DOWNSTREAM_B: &str = "service-b";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory store
/// - `AUDIT_FILE`: JSON audit file (default `data/users.json`); empty disables the audit trail
/// - `DOWNSTREAM_A_URL` / `DOWNSTREAM_B_URL`: downstream services; both must be set
///   for real HTTP calls, otherwise in-memory fakes answer
/// - `DOWNSTREAM_TIMEOUT_MS`: per-request timeout (default 5000)
/// - `RETRY_MAX_ATTEMPTS`: attempts per downstream call (default 5)
/// - `RETRY_BACKOFF_MS`: initial backoff between attempts (default 0, immediate)
/// - `FANOUT_CONCURRENT`: notify both services at once (default false)
/// - `NOTIFY_DEADLINE_MS`: total time allowed per service, retries included (default none)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub audit_file: Option<PathBuf>,
    pub downstream_a_url: Option<String>,
    pub downstream_b_url: Option<String>,
    pub downstream_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_backoff: Duration,
    pub fan_out_concurrent: bool,
    pub notify_deadline: Option<Duration>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let millis = |key: &str| {
            non_empty(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match non_empty("LOG_FORMAT") {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            audit_file: match lookup("AUDIT_FILE") {
                Some(path) if path.trim().is_empty() => None,
                Some(path) => Some(PathBuf::from(path)),
                None => defaults.audit_file,
            },
            downstream_a_url: non_empty("DOWNSTREAM_A_URL"),
            downstream_b_url: non_empty("DOWNSTREAM_B_URL"),
            downstream_timeout: millis("DOWNSTREAM_TIMEOUT_MS")
                .unwrap_or(defaults.downstream_timeout),
            retry_max_attempts: non_empty("RETRY_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retry_max_attempts),
            retry_backoff: millis("RETRY_BACKOFF_MS").unwrap_or(defaults.retry_backoff),
            fan_out_concurrent: non_empty("FANOUT_CONCURRENT")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.fan_out_concurrent),
            notify_deadline: millis("NOTIFY_DEADLINE_MS").filter(|d| !d.is_zero()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true when both downstream URLs are configured.
    pub fn uses_http_downstream(&self) -> bool {
        self.downstream_a_url.is_some() && self.downstream_b_url.is_some()
    }

    /// Returns the downstream endpoints, in notification order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let url = |configured: &Option<String>, name: &str| {
            configured
                .clone()
                .unwrap_or_else(|| format!("memory://{name}/users"))
        };
        vec![
            Endpoint::new(DOWNSTREAM_A, url(&self.downstream_a_url, DOWNSTREAM_A)),
            Endpoint::new(DOWNSTREAM_B, url(&self.downstream_b_url, DOWNSTREAM_B)),
        ]
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.retry_max_attempts);
        if self.retry_backoff.is_zero() {
            policy
        } else {
            let max = self.retry_backoff.checked_mul(16).unwrap_or(Duration::MAX);
            policy.with_backoff(self.retry_backoff, max)
        }
    }

    pub fn fan_out(&self) -> FanOut {
        if self.fan_out_concurrent {
            FanOut::Concurrent
        } else {
            FanOut::Sequential
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            audit_file: Some(PathBuf::from(DEFAULT_AUDIT_FILE)),
            downstream_a_url: None,
            downstream_b_url: None,
            downstream_timeout: Duration::from_millis(5000),
            retry_max_attempts: registration::retry::DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::ZERO,
            fan_out_concurrent: false,
            notify_deadline: None,
        }
    }
}
