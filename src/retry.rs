//! Exponential backoff for background gateway reads.
//!
//! Mutations are never retried; only reconciliation fetches go through here.
//! Every attempt and every pause races the caller's cancellation token, so a
//! shutdown never waits out a slow fetch or a backoff.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// Pause before retry number `retry` (1-based)
    fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("cancelled")]
    Cancelled,
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Run `operation` until it succeeds, `config.max_retries` extra attempts
/// are used up, or `token` is cancelled. The pause doubles after each
/// failure, capped at `config.max_delay`.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    token: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let err = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RetryError::Cancelled),
            result = operation() => match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            },
        };
        if attempts > config.max_retries {
            return Err(RetryError::Exhausted { attempts, last: err });
        }

        let delay = config.delay_for(attempts);
        tracing::warn!(
            "Attempt {}/{} failed: {}; next try in {:?}",
            attempts,
            config.max_retries + 1,
            err,
            delay
        );
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
