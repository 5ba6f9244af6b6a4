//! Retry policy with exponential backoff.
//!
//! The policy is plain data: how many attempts each error kind gets and how
//! long to wait between them. `RetryPolicy::run` is the only retry loop in
//! the crate.

use std::future::Future;
use std::time::Duration;

use crate::error::{AnalystError, Result};

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed {
        delay: Duration,
    },
    /// `base * factor^retry`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(2),
            factor: 2.0,
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    /// Longest wait this backoff ever produces.
    pub const fn ceiling(self) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { max, .. } => max,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, factor, max } => {
                let scale = factor.powi(i32::try_from(retry).unwrap_or(i32::MAX));
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                Duration::from_secs_f64(seconds.max(0.0))
            }
        }
    }
}

/// Attempt budgets per error kind. Totals include the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// HTTP 429
    pub rate_limited_attempts: u32,
    /// Network timeouts
    pub timeout_attempts: u32,
    /// Connection failures and 5xx responses
    pub transient_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limited_attempts: 3,
            timeout_attempts: 2,
            transient_attempts: 2,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt for every kind.
    pub fn no_retry() -> Self {
        Self {
            rate_limited_attempts: 1,
            timeout_attempts: 1,
            transient_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total attempts allowed when the last failure was `err`.
    pub fn attempts_for(&self, err: &AnalystError) -> u32 {
        if !err.is_retryable() {
            return 1;
        }
        match err {
            AnalystError::RateLimited { .. } => self.rate_limited_attempts,
            AnalystError::Timeout(_) => self.timeout_attempts,
            _ => self.transient_attempts,
        }
    }

    /// Wait before retry `retry` (0-based).
    ///
    /// A server-sent `Retry-After` is a floor. `None` when it exceeds the
    /// backoff ceiling: the caller surfaces the error instead of stalling.
    pub fn delay_for(&self, err: &AnalystError, retry: u32) -> Option<Duration> {
        let backoff = self.backoff.delay(retry);
        match err {
            AnalystError::RateLimited {
                retry_after: Some(after),
                ..
            } if *after > self.backoff.ceiling() => None,
            AnalystError::RateLimited {
                retry_after: Some(after),
                ..
            } => Some(backoff.max(*after)),
            _ => Some(backoff),
        }
    }

    /// Run `op` until it succeeds or its error kind runs out of attempts.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.attempts_for(&err) {
                        if attempt > 1 {
                            tracing::warn!(%label, attempt, error = %err, "Giving up after retries");
                        }
                        return Err(err);
                    }

                    let Some(delay) = self.delay_for(&err, attempt - 1) else {
                        tracing::warn!(%label, attempt, error = %err, "Retry-After exceeds backoff ceiling, not retrying");
                        return Err(err);
                    };
                    tracing::warn!(
                        %label,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
