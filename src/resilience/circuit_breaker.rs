//! Circuit breaker state machine.
//!
//! All state lives behind one mutex that is never held across an `.await`,
//! so transitions and counters stay consistent on a multi-threaded runtime
//! and at most one trial call runs while half-open.

use parking_lot::Mutex;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::window::{CallCounts, RollingWindow};
use super::{CircuitBreakerConfig, CircuitEvent, CircuitEventKind, CircuitSnapshot, CircuitState};
use crate::clock::SharedClock;

const EVENT_CAPACITY: usize = 64;

/// Why a protected call did not produce a value
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Short-circuited: open, or a half-open trial is already running
    #[error("circuit {circuit} is open")]
    Open { circuit: String },

    /// The call exceeded the configured timeout
    #[error("circuit {circuit}: call timed out after {timeout:?}")]
    Timeout { circuit: String, timeout: Duration },

    /// The call ran and failed
    #[error("{0}")]
    Failed(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Error,
    Timeout,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    window: RollingWindow,
    totals: CallCounts,
}

/// Failure-isolation wrapper for one downstream call type
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: SharedClock,
    inner: Mutex<Inner>,
    events: broadcast::Sender<CircuitEvent>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        let name = name.into();
        info!(
            circuit = %name,
            timeout_ms = config.timeout.as_millis() as u64,
            error_threshold_percentage = config.error_threshold_percentage,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            "Circuit breaker initialized"
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                opened_at: None,
                trial_in_flight: false,
                window: RollingWindow::new(config.rolling_window, config.rolling_buckets),
                totals: CallCounts::default(),
            }),
            name,
            config,
            clock,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state (an expired open circuit reports `Open` until the next call)
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Receive every transition of this circuit
    pub fn subscribe(&self) -> broadcast::Receiver<CircuitEvent> {
        self.events.subscribe()
    }

    /// Execute `operation` under circuit protection.
    ///
    /// `Ok` from the operation is a success and `Err` a failure; what counts as
    /// an error is decided by the caller when it builds the future.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit().ok_or_else(|| CircuitBreakerError::Open {
            circuit: self.name.clone(),
        })?;

        match tokio::time::timeout(self.config.timeout, operation()).await {
            Ok(Ok(value)) => {
                permit.succeed();
                Ok(value)
            }
            Ok(Err(err)) => {
                permit.fail(Failure::Error);
                Err(CircuitBreakerError::Failed(err))
            }
            Err(_) => {
                permit.fail(Failure::Timeout);
                Err(CircuitBreakerError::Timeout {
                    circuit: self.name.clone(),
                    timeout: self.config.timeout,
                })
            }
        }
    }

    /// Like [`call`](Self::call) but answers with `fallback()` on any breaker error
    pub async fn call_or_fallback<F, Fut, T, E, FB>(&self, operation: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> T,
        E: std::fmt::Display,
    {
        match self.call(operation).await {
            Ok(value) => value,
            Err(err) => {
                debug!(circuit = %self.name, error = %err, "Serving fallback");
                let now = self.clock.now();
                let mut inner = self.inner.lock();
                inner.window.current(now).fallbacks += 1;
                inner.totals.fallbacks += 1;
                drop(inner);
                fallback()
            }
        }
    }

    /// Operator override: open immediately
    pub fn force_open(&self) {
        warn!(circuit = %self.name, "Circuit breaker forced open");
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.open(&mut inner, now);
    }

    /// Operator override: close immediately and reset the window
    pub fn force_closed(&self) {
        warn!(circuit = %self.name, "Circuit breaker forced closed");
        let mut inner = self.inner.lock();
        self.close(&mut inner);
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let window = inner.window.totals(now);
        let retry_in_ms = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(at)) => Some(match self.retry_at(at) {
                Some(retry_at) => retry_at.saturating_duration_since(now).as_millis() as u64,
                None => u64::MAX,
            }),
            _ => None,
        };
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            window,
            totals: inner.totals,
            failure_rate_percent: window.failure_rate_percent(),
            retry_in_ms,
        }
    }

    /// When an Open circuit admits its next trial; `None` means never
    fn retry_at(&self, opened_at: Instant) -> Option<Instant> {
        opened_at.checked_add(self.config.reset_timeout)
    }

    fn admit(&self) -> Option<Permit<'_>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let due = inner
                .opened_at
                .is_none_or(|at| self.retry_at(at).is_some_and(|retry_at| now >= retry_at));
            if due {
                self.transition(&mut inner, CircuitState::HalfOpen);
            }
        }

        let admission = match inner.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Some(Admission::Trial)
            }
            _ => None,
        };

        match admission {
            Some(admission) => Some(Permit {
                breaker: self,
                admission,
                settled: false,
            }),
            None => {
                inner.window.current(now).rejects += 1;
                inner.totals.rejects += 1;
                None
            }
        }
    }

    fn record_success(&self, admission: Admission) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let bucket = inner.window.current(now);
        bucket.fires += 1;
        bucket.successes += 1;
        inner.totals.fires += 1;
        inner.totals.successes += 1;

        if admission == Admission::Trial {
            inner.trial_in_flight = false;
            if inner.state == CircuitState::HalfOpen {
                self.close(&mut inner);
            }
        }
    }

    fn record_failure(&self, admission: Admission, failure: Failure) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let bucket = inner.window.current(now);
        bucket.fires += 1;
        match failure {
            Failure::Error => bucket.failures += 1,
            Failure::Timeout => bucket.timeouts += 1,
        }
        inner.totals.fires += 1;
        match failure {
            Failure::Error => inner.totals.failures += 1,
            Failure::Timeout => inner.totals.timeouts += 1,
        }

        if admission == Admission::Trial {
            inner.trial_in_flight = false;
        }

        match inner.state {
            CircuitState::HalfOpen if admission == Admission::Trial => self.open(&mut inner, now),
            CircuitState::Closed => {
                let window = inner.window.totals(now);
                let threshold = f64::from(self.config.error_threshold_percentage);
                if window.fires >= u64::from(self.config.volume_threshold)
                    && window.failure_rate_percent() >= threshold
                {
                    self.open(&mut inner, now);
                }
            }
            _ => {}
        }
    }

    fn release_trial(&self) {
        let mut inner = self.inner.lock();
        inner.trial_in_flight = false;
        debug!(circuit = %self.name, "Half-open trial abandoned");
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        inner.opened_at = Some(now);
        inner.trial_in_flight = false;
        self.transition(inner, CircuitState::Open);
    }

    fn close(&self, inner: &mut Inner) {
        inner.opened_at = None;
        inner.trial_in_flight = false;
        inner.window.clear();
        self.transition(inner, CircuitState::Closed);
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        if from == to {
            return;
        }

        let kind = match to {
            CircuitState::Open => {
                warn!(circuit = %self.name, %from, "Circuit breaker opened");
                CircuitEventKind::Opened
            }
            CircuitState::Closed => {
                info!(circuit = %self.name, %from, "Circuit breaker closed");
                CircuitEventKind::Closed
            }
            CircuitState::HalfOpen => {
                info!(circuit = %self.name, "Circuit breaker half-open");
                CircuitEventKind::HalfOpen
            }
        };
        // No subscribers is fine
        let _ = self.events.send(CircuitEvent {
            circuit: self.name.clone(),
            kind,
        });
    }
}

/// Admission ticket for one call; releases the half-open trial slot if the
/// call future is dropped before it settles.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl Permit<'_> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.admission);
    }

    fn fail(mut self, failure: Failure) {
        self.settled = true;
        self.breaker.record_failure(self.admission, failure);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Trial {
            self.breaker.release_trial();
        }
    }
}
