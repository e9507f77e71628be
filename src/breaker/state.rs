//! Server-side circuit breaker snapshot.
//!
//! The breaker lives in the backend; this client only observes it. Older
//! backends report `isOpen` instead of a `state` string.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        })
    }
}

/// One observation of the backend breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSnapshot")]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub success_count: u64,
    pub failure_count: u64,
    /// Failure percentage (0..=100) at which the backend opens the breaker.
    pub failure_threshold: u8,
}

impl BreakerSnapshot {
    /// Fraction of failed calls in the backend's window; 0 with no traffic.
    pub fn failure_rate(&self) -> f64 {
        match self.total_calls() {
            0 => 0.0,
            total => self.failure_count as f64 / total as f64,
        }
    }

    /// Calls observed in the window. Saturates; the counters come from the server.
    pub fn total_calls(&self) -> u64 {
        self.success_count.saturating_add(self.failure_count)
    }

    pub fn is_open(&self) -> bool {
        self.state == BreakerState::Open
    }

    /// Whether the observed rate is at or above the configured threshold.
    pub fn over_threshold(&self) -> bool {
        self.total_calls() > 0 && self.failure_rate() * 100.0 >= f64::from(self.failure_threshold)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    state: Option<BreakerState>,
    #[serde(default)]
    is_open: Option<bool>,
    #[serde(default)]
    success_count: u64,
    #[serde(default)]
    failure_count: u64,
    #[serde(default)]
    failure_threshold: u64,
}

impl From<RawSnapshot> for BreakerSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        let state = raw.state.unwrap_or(match raw.is_open {
            Some(true) => BreakerState::Open,
            _ => BreakerState::Closed,
        });
        Self {
            state,
            success_count: raw.success_count,
            failure_count: raw.failure_count,
            failure_threshold: raw.failure_threshold.min(100) as u8,
        }
    }
}
