//! Reconnect delay computation.
//!
//! The field shape and defaults are grounded on the teacher's
//! `ws::config::ReconnectConfig`, but the delay formula is hand-rolled
//! instead of routed through the `backoff` crate: `backoff`'s
//! `ExponentialBackoff` is a stateful iterator that doesn't expose a clean
//! seam for a user-supplied `getDelay` override or for rolling jitter once
//! per socket rather than once per attempt (see DESIGN.md).

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// User-supplied override for reconnect delay computation. Receives the
/// zero-based retry attempt number and the error that triggered the retry
/// (`None` on the very first disconnect if no error was recorded).
pub type GetDelay = Arc<dyn Fn(u32, Option<&Error>) -> Duration + Send + Sync>;

/// Exponential backoff with a once-per-socket jitter roll.
#[derive(Clone)]
pub struct RetryPolicy {
    min_reconnection_delay: Duration,
    max_reconnection_delay: Duration,
    grow_factor: f64,
    max_retries: Option<u32>,
    get_delay: Option<GetDelay>,
    jitter: Duration,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("min_reconnection_delay", &self.min_reconnection_delay)
            .field("max_reconnection_delay", &self.max_reconnection_delay)
            .field("grow_factor", &self.grow_factor)
            .field("max_retries", &self.max_retries)
            .field("get_delay", &self.get_delay.is_some())
            .field("jitter", &self.jitter)
            .finish()
    }
}

/// Builder-style configuration mirroring the teacher's `ReconnectConfig`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub min_reconnection_delay: Duration,
    pub max_reconnection_delay: Duration,
    pub grow_factor: f64,
    pub max_retries: Option<u32>,
    pub get_delay: Option<GetDelay>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_reconnection_delay: Duration::from_millis(1000),
            max_reconnection_delay: Duration::from_millis(10_000),
            grow_factor: 1.3,
            max_retries: None,
            get_delay: None,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from `config`, rolling the once-per-socket jitter now.
    /// `rng` is taken by value so callers (and tests) can supply a seeded
    /// generator.
    pub fn new(config: RetryConfig, rng: &mut impl Rng) -> Self {
        let jitter = Duration::from_millis(rng.random_range(0..=4000));
        Self {
            min_reconnection_delay: config.min_reconnection_delay + jitter,
            max_reconnection_delay: config.max_reconnection_delay,
            grow_factor: config.grow_factor,
            max_retries: config.max_retries,
            get_delay: config.get_delay,
            jitter,
        }
    }

    #[must_use]
    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Whether `retry_count` has exceeded the configured `max_retries`.
    /// `max_retries` counts retries, not attempts: with `max_retries: 2` the
    /// socket makes the initial attempt plus 2 retries (3 attempts total)
    /// before this returns `true`.
    #[must_use]
    pub fn retries_exhausted(&self, retry_count: u32) -> bool {
        self.max_retries.is_some_and(|max| retry_count > max)
    }

    /// Delay to wait before the attempt numbered `retry_count` (0-based).
    #[must_use]
    pub fn delay_for(&self, retry_count: u32, last_error: Option<&Error>) -> Duration {
        if let Some(get_delay) = &self.get_delay {
            return get_delay(retry_count, last_error);
        }

        let scaled = self.min_reconnection_delay.as_secs_f64() * self.grow_factor.powi(retry_count as i32);
        // `.max(min).min(max)` rather than `f64::clamp`: the once-per-socket
        // jitter is added to `min_reconnection_delay` regardless of whether
        // the caller left it at its default, so a caller-supplied
        // `max_reconnection_delay` below the jittered min is reachable in
        // practice, not just a theoretical misconfiguration. `clamp` panics
        // when its bounds are inverted; saturating to `max` here instead
        // treats the configured ceiling as authoritative.
        let clamped = scaled
            .max(self.min_reconnection_delay.as_secs_f64())
            .min(self.max_reconnection_delay.as_secs_f64());
        Duration::from_secs_f64(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_without_jitter() -> RetryPolicy {
        let config = RetryConfig {
            min_reconnection_delay: Duration::from_millis(1000),
            ..Default::default()
        };
        RetryPolicy {
            min_reconnection_delay: config.min_reconnection_delay,
            max_reconnection_delay: config.max_reconnection_delay,
            grow_factor: config.grow_factor,
            max_retries: config.max_retries,
            get_delay: config.get_delay,
            jitter: Duration::ZERO,
        }
    }

    #[test]
    fn delay_grows_with_retry_count() {
        let policy = policy_without_jitter();
        let d0 = policy.delay_for(0, None);
        let d1 = policy.delay_for(1, None);
        let d2 = policy.delay_for(2, None);
        assert!(d0 < d1);
        assert!(d1 < d2);
    }

    #[test]
    fn delay_respects_max() {
        let policy = policy_without_jitter();
        let d = policy.delay_for(50, None);
        assert_eq!(d, Duration::from_millis(10_000));
    }

    #[test]
    fn delay_never_below_min() {
        let policy = policy_without_jitter();
        let d = policy.delay_for(0, None);
        assert_eq!(d, Duration::from_millis(1000));
    }

    #[test]
    fn get_delay_override_takes_precedence() {
        let config = RetryConfig {
            get_delay: Some(Arc::new(|attempt, _| Duration::from_millis(u64::from(attempt) * 7))),
            ..Default::default()
        };
        let mut rng = rand::rng();
        let policy = RetryPolicy::new(config, &mut rng);
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(21));
    }

    #[test]
    fn max_retries_none_never_exhausts() {
        let policy = policy_without_jitter();
        assert!(!policy.retries_exhausted(1_000_000));
    }

    #[test]
    fn max_retries_some_exhausts_one_past_the_limit() {
        let mut policy = policy_without_jitter();
        policy.max_retries = Some(3);
        assert!(!policy.retries_exhausted(3));
        assert!(policy.retries_exhausted(4));
    }

    #[test]
    fn max_retries_two_allows_three_total_attempts() {
        // Tracing scenario 7: `maxRetries: 2` means the initial attempt plus
        // 2 retries (3 attempts total) before the socket gives up.
        let mut policy = policy_without_jitter();
        policy.max_retries = Some(2);
        assert!(!policy.retries_exhausted(0)); // initial attempt
        assert!(!policy.retries_exhausted(1)); // retry 1
        assert!(!policy.retries_exhausted(2)); // retry 2
        assert!(policy.retries_exhausted(3)); // give up
    }

    #[test]
    fn jitter_is_rolled_once_and_stays_fixed_across_calls() {
        let mut rng = rand::rng();
        let policy = RetryPolicy::new(RetryConfig::default(), &mut rng);
        let jitter_a = policy.jitter();
        let jitter_b = policy.jitter();
        assert_eq!(jitter_a, jitter_b);
    }
}
