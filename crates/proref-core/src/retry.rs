//! Retry with exponential backoff for network-bound operations.
//!
//! A [`RetryPolicy`] is stateless between invocations: every call to
//! [`RetryPolicy::run`] starts again from `initial_delay`. The backoff wait is
//! awaited by the calling task, so no other work is started while waiting.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, warn};

use crate::defaults::{
    PUBLISH_RETRY_INITIAL_DELAY_MS, RETRY_BACKOFF_MULTIPLIER, RETRY_INITIAL_DELAY_MS,
    RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_SECS,
};
use crate::error::{Error, Result};

/// Decides whether a failure is worth another attempt.
pub type RetryPredicate = fn(&Error) -> bool;

/// Exponential backoff retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
    retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            backoff_multiplier: RETRY_BACKOFF_MULTIPLIER,
            retryable: Error::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Build a policy retrying transient errors.
    ///
    /// Requires `max_attempts >= 1`, a non-zero `initial_delay`, and a finite
    /// `backoff_multiplier >= 1.0`.
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::InvalidInput(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if initial_delay.is_zero() {
            return Err(Error::InvalidInput(
                "retry initial_delay must be positive".to_string(),
            ));
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(Error::InvalidInput(format!(
                "retry backoff_multiplier must be >= 1.0, got {}",
                backoff_multiplier
            )));
        }
        Ok(Self {
            max_attempts,
            initial_delay,
            backoff_multiplier,
            retryable: Error::is_transient,
        })
    }

    /// Policy used when posting comments to the tracker (3 attempts, 2s, x2).
    pub fn for_publishing() -> Self {
        Self {
            initial_delay: Duration::from_millis(PUBLISH_RETRY_INITIAL_DELAY_MS),
            ..Self::default()
        }
    }

    /// Replace the retryable-error predicate.
    pub fn with_predicate(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Delay waited after the given failed attempt (1-based), capped at
    /// [`RETRY_MAX_DELAY_SECS`].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        scale_delay(self.initial_delay, self.backoff_multiplier.powi(exponent))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or exhausts `max_attempts`. The last failure is returned unchanged.
    pub async fn run<T, F, Fut>(&self, op: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_inner(op, operation, None).await
    }

    /// Like [`run`](Self::run), but a `true` on `shutdown` during a backoff
    /// wait stops retrying and returns the last failure.
    pub async fn run_with_shutdown<T, F, Fut>(
        &self,
        op: &str,
        operation: F,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_inner(op, operation, Some(shutdown)).await
    }

    async fn run_inner<T, F, Fut>(
        &self,
        op: &str,
        mut operation: F,
        mut shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !(self.retryable)(&err) {
                return Err(err);
            }

            if attempt >= self.max_attempts {
                error!(
                    subsystem = "core",
                    component = "retry",
                    op,
                    attempt,
                    error = %err,
                    "Retries exhausted"
                );
                return Err(err);
            }

            warn!(
                subsystem = "core",
                component = "retry",
                op,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, backing off"
            );

            if wait(delay, shutdown.as_deref_mut()).await {
                warn!(
                    subsystem = "core",
                    component = "retry",
                    op,
                    attempt,
                    "Shutdown requested during backoff"
                );
                return Err(err);
            }

            delay = scale_delay(delay, self.backoff_multiplier);
            attempt += 1;
        }
    }
}

/// `delay * factor`, saturating at the maximum backoff wait.
fn scale_delay(delay: Duration, factor: f64) -> Duration {
    let max = Duration::from_secs(RETRY_MAX_DELAY_SECS);
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
        .map(|scaled| scaled.min(max))
        .unwrap_or(max)
}

/// Sleep for `delay`. Returns `true` if shutdown was signalled first.
async fn wait(delay: Duration, shutdown: Option<&mut watch::Receiver<bool>>) -> bool {
    let Some(rx) = shutdown else {
        tokio::time::sleep(delay).await;
        return false;
    };

    if *rx.borrow() {
        return true;
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = rx.changed() => match changed {
                Ok(()) if *rx.borrow() => return true,
                Ok(()) => continue,
                Err(_) => {
                    // Sender dropped; nobody can signal anymore.
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}
