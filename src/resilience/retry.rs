use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// total attempts, including the first one
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetrySettings {
    pub fn from_config(retry: Option<&RetryConfig>) -> Self {
        Self {
            attempts: retry
                .and_then(|r| r.attempts)
                .unwrap_or(DEFAULT_RETRY_ATTEMPTS)
                .max(1),
            base_delay_ms: retry
                .and_then(|r| r.base_delay_ms)
                .unwrap_or(DEFAULT_BASE_DELAY_MS),
            max_delay_ms: retry
                .and_then(|r| r.max_delay_ms)
                .unwrap_or(DEFAULT_MAX_DELAY_MS),
        }
    }

    /// Delay before the attempt following `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// Runs `operation` until `should_retry` rejects its outcome or attempts are exhausted.
    ///
    /// The last outcome is returned as is, so an operation that keeps producing a
    /// retryable `Ok` value (e.g. a 503 response) hands that value back to the caller.
    pub async fn run_with_retry<F, Fut, T, E, R>(&self, mut operation: F, should_retry: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        R: Fn(&Result<T, E>) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = operation().await;
            if !should_retry(&outcome) {
                return outcome;
            }
            if attempt >= attempts {
                match &outcome {
                    Err(e) => error!("all {attempt} attempts failed: {e}"),
                    Ok(_) => error!("all {attempt} attempts returned a retryable result"),
                }
                return outcome;
            }
            let delay = self.delay_for_attempt(attempt);
            match &outcome {
                Err(e) => warn!("Attempt {attempt}/{attempts} failed: {e}, retrying in {delay:?}"),
                Ok(_) => warn!("Attempt {attempt}/{attempts} returned a retryable result, retrying in {delay:?}"),
            }
            sleep(delay).await;
            attempt += 1;
        }
    }
}
