//! Retry executor with exponential backoff.

use std::future::Future;
use std::time::Duration;
use switchyard_types::models::RetrySettings;
use switchyard_types::GatewayError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Error substrings that mark a transient upstream failure.
const RETRIABLE_PATTERNS: &[&str] = &[
    "429",
    "503",
    "502",
    "504",
    "timeout",
    "deadline exceeded",
    "connection refused",
    "connection reset",
    "request_timeout_error",
    "rate_limit_reached",
    "rate limit",
    "overloaded",
    "service unavailable",
    "bad gateway",
];

/// Whether an error is worth another attempt.
///
/// Cancellation and locally refused calls never are; upstream errors are
/// classified by message content.
pub fn is_retriable(err: &GatewayError) -> bool {
    match err {
        GatewayError::Timeout { .. } => true,
        GatewayError::Upstream { message, .. } => {
            let lower = message.to_lowercase();
            RETRIABLE_PATTERNS.iter().any(|p| lower.contains(p))
        },
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Per-attempt limit; expiry counts as a retriable timeout
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            attempt_timeout: None,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: settings.multiplier,
            attempt_timeout: settings.attempt_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): `min(base * mult^(attempt-1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;
        if !delay_ms.is_finite() || delay_ms >= max_ms {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms as u64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails non-retriably, or attempts run out.
    ///
    /// Cancellation is observed before each attempt, while an attempt is in
    /// flight, and during backoff sleeps.
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.execute_observed(cancel, op, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `on_failure` with every failed
    /// attempt's error, attempt timeouts included.
    pub async fn execute_observed<T, F, Fut, O>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        mut on_failure: O,
    ) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
        O: FnMut(&GatewayError),
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GatewayError::Cancelled),
                result = self.run_attempt(op()) => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            on_failure(&err);

            if !is_retriable(&err) {
                debug!(attempt, error = %err, "Non-retriable error, stopping");
                return Err(err);
            }
            if attempt >= max_attempts {
                debug!(attempt, error = %err, "Retry attempts exhausted");
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            info!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after backoff"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GatewayError::Cancelled),
                () = tokio::time::sleep(delay) => {},
            }
        }
    }

    async fn run_attempt<T, Fut>(&self, fut: Fut) -> Result<T, GatewayError>
    where
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        match self.policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout { duration_ms: limit.as_millis() as u64 }),
            },
            None => fut.await,
        }
    }
}
