//! # Resilience
//!
//! Per-dependency failure isolation. Each downstream service gets exactly one
//! [`CircuitBreaker`], owned by its dependency proxy and injected at startup.
//!
//! ```text
//! Closed ──(failure rate ≥ threshold in rolling window)──▶ Open
//! Open ──(now ≥ opened_at + reset_timeout)──▶ HalfOpen
//! HalfOpen ──(trial succeeds)──▶ Closed
//! HalfOpen ──(trial fails)──▶ Open
//! ```

pub mod circuit_breaker;
pub mod window;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError};
pub use window::{CallCounts, RollingWindow};

/// Circuit breaker tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Hard limit on a single call; exceeding it counts as a failure
    pub timeout: Duration,
    /// Failure rate (percent) within the rolling window that opens the circuit
    pub error_threshold_percentage: u8,
    /// Cool-down before a trial call is allowed
    pub reset_timeout: Duration,
    /// Span of the rolling statistics window
    pub rolling_window: Duration,
    /// Number of buckets the window is divided into
    pub rolling_buckets: u32,
    /// Minimum calls in the window before the failure rate is evaluated
    pub volume_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            error_threshold_percentage: 50,
            reset_timeout: Duration::from_millis(3000),
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
            volume_threshold: 0,
        }
    }
}

/// Operational mode of a circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls short-circuit to the fallback
    Open,
    /// One trial call decides the next state
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition notification, published on every state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitEvent {
    pub circuit: String,
    pub kind: CircuitEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitEventKind {
    Opened,
    Closed,
    HalfOpen,
}

/// Point-in-time view of a circuit for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    /// Counters inside the rolling window
    pub window: CallCounts,
    /// Counters since process start
    pub totals: CallCounts,
    /// Failure rate inside the rolling window, in percent
    pub failure_rate_percent: f64,
    /// Milliseconds until a trial call is allowed (only while open)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}
