// src/client/backoff.rs

use crate::config::BackoffConfig;
use std::time::Duration;
use tracing::trace;

/// Capped exponential backoff: `min(base * 2^(attempt - 1), cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Policy that never sleeps.
    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_ms),
            Duration::from_millis(config.cap_ms),
        )
    }

    /// Delay after the given 1-based attempt.
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    pub async fn wait(&self, attempt: usize) {
        let delay = self.delay(attempt);
        if delay.is_zero() {
            return;
        }
        trace!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
        tokio::time::sleep(delay).await;
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 100)]
    #[case(2, 200)]
    #[case(3, 400)]
    #[case(4, 800)]
    #[case(5, 1600)]
    #[case(6, 2000)]
    #[case(10, 2000)]
    #[case(200, 2000)]
    fn test_default_schedule(#[case] attempt: usize, #[case] expected_ms: u64) {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn test_none_never_sleeps() {
        let policy = BackoffPolicy::none();
        assert!((1..50).all(|a| policy.delay(a).is_zero()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_delay() {
        let policy = BackoffPolicy::default();
        let start = tokio::time::Instant::now();
        policy.wait(3).await;
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    proptest! {
        #[test]
        fn prop_delay_non_decreasing_and_capped(
            base_ms in 0u64..5_000,
            extra_ms in 0u64..60_000,
            attempt in 1usize..100,
        ) {
            let cap_ms = base_ms + extra_ms;
            let policy = BackoffPolicy::new(
                Duration::from_millis(base_ms),
                Duration::from_millis(cap_ms),
            );
            let current = policy.delay(attempt);
            let next = policy.delay(attempt + 1);
            prop_assert!(current <= next);
            prop_assert!(next <= Duration::from_millis(cap_ms));
        }
    }
}
