//! Timeout enforcement.
//!
//! # Responsibilities
//! - Resolve the deadline for each outbound call
//! - Bound caller-specified timeouts to the configured minimum/maximum
//!
//! # Design Decisions
//! - Every outbound call has a deadline; there is no "no timeout" option
//! - Timeout errors are distinct from other transport errors
//! - For polling consumers a timeout is just a failed probe

use std::time::Duration;

use crate::config::TimeoutConfig;

/// Headroom between a server-side long-poll wait and the HTTP deadline.
pub const LONG_POLL_GRACE: Duration = Duration::from_secs(5);

/// Deadline policy derived from [`TimeoutConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    default: Duration,
    min: Duration,
    max: Duration,
}

impl TimeoutPolicy {
    pub fn new(config: &TimeoutConfig) -> Self {
        let min = Duration::from_millis(config.min_ms);
        let max = Duration::from_millis(config.max_ms.max(config.min_ms));
        Self {
            default: Duration::from_millis(config.default_ms).clamp(min, max),
            min,
            max,
        }
    }

    /// Effective timeout for a call that requested `requested`.
    pub fn resolve(&self, requested: Option<Duration>) -> Duration {
        requested.map_or(self.default, |d| d.clamp(self.min, self.max))
    }

    /// Clamp a millisecond value the backend receives as a parameter.
    pub fn clamp_millis(&self, ms: u64) -> u64 {
        self.resolve(Some(Duration::from_millis(ms))).as_millis() as u64
    }

    /// Server-side wait for a long-poll, leaving [`LONG_POLL_GRACE`] under
    /// the maximum for the HTTP deadline.
    pub fn long_poll_wait(&self, wait: Duration) -> Duration {
        let ceiling = self.max.saturating_sub(LONG_POLL_GRACE).max(self.min);
        wait.clamp(self.min, ceiling)
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::new(&TimeoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bounds() {
        let policy = TimeoutPolicy::new(&TimeoutConfig {
            default_ms: 30_000,
            min_ms: 1_000,
            max_ms: 60_000,
        });

        assert_eq!(policy.resolve(None), Duration::from_secs(30));
        assert_eq!(policy.resolve(Some(Duration::from_millis(10))), Duration::from_secs(1));
        assert_eq!(policy.resolve(Some(Duration::from_secs(600))), Duration::from_secs(60));
        assert_eq!(policy.resolve(Some(Duration::from_secs(5))), Duration::from_secs(5));
        assert_eq!(policy.clamp_millis(120_000), 60_000);
    }

    #[test]
    fn test_long_poll_deadline_outlasts_wait() {
        let policy = TimeoutPolicy::default();

        let wait = policy.long_poll_wait(Duration::from_secs(3600));
        assert_eq!(wait, Duration::from_secs(295));
        let effective = policy.resolve(Some(wait + LONG_POLL_GRACE));
        assert_eq!(effective, Duration::from_secs(300));
        assert!(effective > wait);

        assert_eq!(policy.long_poll_wait(Duration::from_secs(20)), Duration::from_secs(20));
        assert_eq!(policy.long_poll_wait(Duration::ZERO), Duration::from_secs(1));
    }

    #[test]
    fn test_inverted_bounds_do_not_panic() {
        let policy = TimeoutPolicy::new(&TimeoutConfig {
            default_ms: 5,
            min_ms: 100,
            max_ms: 10,
        });
        assert_eq!(policy.resolve(None), Duration::from_millis(100));
    }
}
