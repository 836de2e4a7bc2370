//! Retry with exponential backoff
//!
//! Every external call (LLM generation, page navigation, element waits) runs
//! through a [`RetryPolicy`]. An operation yields `Ok(Some(value))` on success,
//! `Ok(None)` for an empty result, or `Err(e)` for a transport failure. Empty
//! results are retried only when `retry_on_empty` is set.
//!
//! When the budget runs out the outcome of the last attempt decides the result:
//! an empty last attempt returns `Ok(None)` (or the caller's fallback), a failed
//! last attempt returns [`RetryError`] carrying that error.
//!
//! [`RetryPolicy::run_with`] lets the caller classify each error: a permanent
//! failure ends the run at once, and a server-provided wait replaces the
//! computed backoff.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retry_on_empty: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30_000),
            retry_on_empty: true,
        }
    }
}

/// What a failed attempt means for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retrying cannot help.
    GiveUp,
    /// Wait per [`RetryPolicy::delay_for`].
    Scheduled,
    /// Wait exactly this long.
    After(Duration),
}

/// Attempt budget exhausted or a permanent failure; holds the error from the
/// final attempt.
#[derive(Debug)]
pub struct RetryError<E> {
    pub operation: String,
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempts: {}",
            self.operation, self.attempts, self.last_error
        )
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.last_error
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// Zero-delay policy for tests and cheap local operations.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            retry_on_empty: true,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_retry_on_empty(mut self, retry_on_empty: bool) -> Self {
        self.retry_on_empty = retry_on_empty;
        self
    }

    /// Backoff before attempt `attempt + 1`: `base * 2^(attempt - 1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Runs `op` until it yields a value, the result is final, or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. Every error is retried.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<Option<T>, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: fmt::Display,
    {
        self.run_with(operation, |_| Backoff::Scheduled, op).await
    }

    /// Like [`run`](Self::run) with `classify` deciding how each error is handled.
    pub async fn run_with<T, E, F, Fut, C>(
        &self,
        operation: &str,
        classify: C,
        mut op: F,
    ) -> Result<Option<T>, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: fmt::Display,
        C: Fn(&E) -> Backoff,
    {
        let max_attempts = self.max_attempts.max(1);
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut delay = self.delay_for(attempt);
            let last_error = match op(attempt).await {
                Ok(Some(value)) => {
                    if attempt > 1 {
                        debug!(
                            operation,
                            attempt,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(Some(value));
                }
                Ok(None) if !self.retry_on_empty => return Ok(None),
                Ok(None) => {
                    if attempt >= max_attempts {
                        warn!(operation, attempt, "Operation still empty, giving up");
                        return Ok(None);
                    }
                    None
                }
                Err(e) => {
                    let backoff = classify(&e);
                    if backoff == Backoff::GiveUp || attempt >= max_attempts {
                        if backoff == Backoff::GiveUp {
                            warn!(operation, attempt, error = %e, "Permanent failure, not retrying");
                        } else {
                            warn!(operation, attempt, error = %e, "Retry budget exhausted");
                        }
                        return Err(RetryError {
                            operation: operation.to_string(),
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    if let Backoff::After(wait) = backoff {
                        delay = wait;
                    }
                    Some(e)
                }
            };

            match &last_error {
                Some(e) => warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Operation failed, retrying after backoff"
                ),
                None => debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Operation returned empty result, retrying after backoff"
                ),
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Like [`run`](Self::run) but substitutes `fallback` for an empty final result.
    pub async fn run_or_else<T, E, F, Fut, D>(
        &self,
        operation: &str,
        fallback: D,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: fmt::Display,
        D: FnOnce() -> T,
    {
        Ok(self.run(operation, op).await?.unwrap_or_else(fallback))
    }
}
