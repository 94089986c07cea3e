//! Bounded retry around a single downstream call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::client::CallResponse;
use crate::error::DownstreamError;

/// Default number of attempts, first call included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Jitter applied around each backoff delay (±10%).
const JITTER_FACTOR: f64 = 0.1;

/// Information passed to the retry hook before each retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// The attempt about to run (2 for the first retry).
    pub attempt: u32,
    pub max_attempts: u32,
    /// Description of the failure that triggered the retry.
    pub failure: String,
}

/// Callback fired once per retry.
pub type RetryHook = Arc<dyn Fn(&RetryAttempt) + Send + Sync>;

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    /// The last result observed. A failing status is returned as `Ok` with
    /// that status, exactly as the operation produced it.
    pub result: Result<CallResponse, DownstreamError>,
    /// Number of attempts made.
    pub attempts: u32,
}

impl RetryOutcome {
    /// Returns true if the last attempt succeeded.
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(response) if !response.is_failure())
    }
}

/// Bounded retry policy.
///
/// An attempt fails when the operation returns an error or a response with
/// status >= 400; both are retried the same way. Once attempts run out the
/// last failure is returned unchanged.
///
/// The policy holds no per-call state, so one value can be shared by every
/// registration.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    on_retry: Option<RetryHook>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            on_retry: None,
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Creates a policy making at most `max_attempts` attempts (minimum 1),
    /// retrying immediately.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Waits between attempts with exponential backoff, starting at
    /// `initial` and capped at `max`.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Installs a callback fired once per retry.
    pub fn with_retry_hook(mut self, hook: RetryHook) -> Self {
        self.on_retry = Some(hook);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay before retry number `retry` (1-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if self.initial_backoff.is_zero() || retry == 0 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(16) as i32;
        let delay = self.initial_backoff.as_secs_f64() * 2f64.powi(exponent);
        let delay = delay.min(self.max_backoff.as_secs_f64());

        let jitter = rand::thread_rng().gen_range(1.0 - JITTER_FACTOR..=1.0 + JITTER_FACTOR);
        Duration::try_from_secs_f64(delay * jitter).unwrap_or(Duration::MAX)
    }

    /// Runs `op` until it succeeds or attempts run out.
    pub async fn execute<F, Fut>(&self, mut op: F) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CallResponse, DownstreamError>>,
    {
        let mut attempt = 1;
        loop {
            let result = op().await;
            let failure = match &result {
                Ok(response) if !response.is_failure() => None,
                Ok(response) => Some(format!("status {}", response.status)),
                Err(e) => Some(e.to_string()),
            };

            let Some(failure) = failure else {
                return RetryOutcome {
                    result,
                    attempts: attempt,
                };
            };
            if attempt >= self.max_attempts {
                tracing::warn!(attempts = attempt, error = %failure, "retries exhausted");
                return RetryOutcome {
                    result,
                    attempts: attempt,
                };
            }

            attempt += 1;
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                error = %failure,
                "downstream call failed, retrying"
            );
            metrics::counter!("downstream_retries_total").increment(1);
            if let Some(hook) = &self.on_retry {
                hook(&RetryAttempt {
                    attempt,
                    max_attempts: self.max_attempts,
                    failure,
                });
            }

            let delay = self.delay_for_retry(attempt - 1);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
