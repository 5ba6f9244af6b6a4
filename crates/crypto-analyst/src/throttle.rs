//! Minimum spacing between upstream requests.
//!
//! The public CoinGecko tier allows roughly 10-30 calls per minute. Every
//! request (retries included) takes a cell from the same GCRA limiter: one
//! cell per `min_interval`, burst of one. Concurrent fetches from one client
//! are therefore serialized at least `min_interval` apart.

use std::time::Duration;

use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::nanos::Nanos;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type SpacingLimiter = RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<Nanos>>;

/// Limiter clock on tokio's time source, so waits follow a paused test clock
#[derive(Clone, Debug)]
struct TokioClock {
    origin: tokio::time::Instant,
}

impl Clock for TokioClock {
    type Instant = Nanos;

    fn now(&self) -> Nanos {
        Nanos::from(self.origin.elapsed())
    }
}

pub struct RequestSpacer {
    min_interval: Duration,
    clock: TokioClock,
    /// `None` when spacing is disabled
    limiter: Option<SpacingLimiter>,
}

impl std::fmt::Debug for RequestSpacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSpacer")
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

impl RequestSpacer {
    pub fn new(min_interval: Duration) -> Self {
        let clock = TokioClock {
            origin: tokio::time::Instant::now(),
        };
        let limiter = Quota::with_period(min_interval)
            .map(|quota| RateLimiter::direct_with_clock(quota, &clock));

        Self {
            min_interval,
            clock,
            limiter,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be sent, then claim the slot.
    pub async fn acquire(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };

        while let Err(not_until) = limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            tracing::debug!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Spacing upstream request"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let spacer = RequestSpacer::new(Duration::from_secs(2));
        let started = Instant::now();
        spacer.acquire().await;
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_are_spaced() {
        let spacer = RequestSpacer::new(Duration::from_secs(2));
        let started = Instant::now();

        spacer.acquire().await;
        spacer.acquire().await;
        spacer.acquire().await;

        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_counts_toward_spacing() {
        let spacer = RequestSpacer::new(Duration::from_secs(2));
        spacer.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let resumed = Instant::now();
        spacer.acquire().await;
        assert!(resumed.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let spacer = Arc::new(RequestSpacer::new(Duration::from_secs(2)));
        let started = Instant::now();

        let a = tokio::spawn({
            let spacer = spacer.clone();
            async move { spacer.acquire().await }
        });
        let b = tokio::spawn({
            let spacer = spacer.clone();
            async move { spacer.acquire().await }
        });
        a.await.unwrap();
        b.await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let spacer = RequestSpacer::new(Duration::ZERO);
        let started = Instant::now();
        for _ in 0..5 {
            spacer.acquire().await;
        }
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
