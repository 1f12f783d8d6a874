//! Bounded polling with backoff
//!
//! Every step handler waits for its element through a [`Poller`]: look,
//! sleep, look again, with the interval growing by `backoff` after each miss
//! up to `max_interval`. The budget is counted in attempts so a stalled page
//! always ends in [`Error::StepTimeout`].

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::Timing;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Poller {
    interval: Duration,
    max_attempts: u32,
    backoff: f64,
    max_interval: Duration,
}

impl Poller {
    /// Fixed-interval poller with a default budget
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: 300,
            backoff: 1.0,
            max_interval: interval,
        }
    }

    /// Poller starting at `base_ms` (scaled) with the run's budget and backoff
    pub fn from_timing(timing: &Timing, base_ms: u64) -> Self {
        let interval = timing.delay(base_ms);
        Self {
            interval,
            max_attempts: timing.max_poll_attempts,
            backoff: timing.backoff_factor,
            max_interval: timing.max_poll_interval().max(interval),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff = factor.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep after the `miss`-th consecutive miss (zero-based)
    pub fn interval_for(&self, miss: u32) -> Duration {
        let factor = self.backoff.powi(miss.min(64) as i32);
        let nanos = (self.interval.as_nanos() as f64 * factor).round();
        if nanos >= self.max_interval.as_nanos() as f64 {
            return self.max_interval;
        }
        Duration::from_nanos(nanos as u64)
    }

    /// Poll `check` until it yields a value.
    ///
    /// Transient errors count as misses; anything else is returned at once.
    /// `step` and `target` name the wait in the timeout error.
    pub async fn until<T, F, Fut>(&self, step: &str, target: &str, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        for attempt in 1..=self.max_attempts {
            match check().await {
                Ok(Some(value)) => {
                    if attempt > 1 {
                        tracing::debug!(step, target, attempt, "found after polling");
                    }
                    return Ok(value);
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    tracing::trace!(step, target, attempt, error = %e, "transient poll error");
                }
                Err(e) => return Err(e),
            }

            if attempt < self.max_attempts {
                sleep(self.interval_for(attempt - 1)).await;
            }
        }

        tracing::debug!(step, target, attempts = self.max_attempts, "poll budget exhausted");
        Err(Error::StepTimeout {
            step: step.to_string(),
            target: target.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_capped() {
        let poller = Poller::new(Duration::from_millis(100))
            .with_backoff(2.0, Duration::from_millis(1000));
        assert_eq!(poller.interval_for(0), Duration::from_millis(100));
        assert_eq!(poller.interval_for(1), Duration::from_millis(200));
        assert_eq!(poller.interval_for(3), Duration::from_millis(800));
        assert_eq!(poller.interval_for(4), Duration::from_millis(1000));
        assert_eq!(poller.interval_for(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_from_timing_never_caps_below_base() {
        let timing = Timing {
            max_poll_interval_ms: 500,
            ..Default::default()
        };
        let poller = Poller::from_timing(&timing, 1000);
        assert_eq!(poller.interval_for(5), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_returns_once_found() {
        let calls = &AtomicU32::new(0);
        let poller = Poller::new(Duration::from_millis(100)).with_max_attempts(10);

        let found = poller
            .until("test", "#late", || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((n == 4).then_some(n))
            })
            .await
            .unwrap();

        assert_eq!(found, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_times_out_after_budget() {
        let calls = &AtomicU32::new(0);
        let poller = Poller::new(Duration::from_millis(100)).with_max_attempts(5);

        let err = poller
            .until("guest-login", "#never", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<Option<()>, Error>(None)
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match err {
            Error::StepTimeout { step, attempts, .. } => {
                assert_eq!(step, "guest-login");
                assert_eq!(attempts, 5);
            }
            other => panic!("expected StepTimeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = &AtomicU32::new(0);
        let poller = Poller::new(Duration::from_millis(100)).with_max_attempts(5);

        let result = poller
            .until("test", "#flaky", || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(Error::ElementNotFound("#flaky".into())),
                    _ => Ok(Some(())),
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_stop_polling() {
        let calls = &AtomicU32::new(0);
        let poller = Poller::new(Duration::from_millis(100)).with_max_attempts(5);

        let err = poller
            .until("test", "#x", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Option<()>, _>(Error::transport("socket closed"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
