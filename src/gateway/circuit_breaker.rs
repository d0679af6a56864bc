//! Per-backend circuit breaker
//!
//! A breaker moves `Closed -> Open` once `max_failures` failures accumulate,
//! `Open -> HalfOpen` when the next call arrives more than `reset_timeout`
//! after the last failure, and `HalfOpen -> Closed` on the first success.
//! In `HalfOpen` a failure only increments the counter; the breaker reopens
//! once the counter reaches `max_failures` again.
//!
//! The lock is only held while admitting a call and while recording its
//! outcome, never across the wrapped operation. Every state transition bumps
//! a generation counter, and outcomes of calls admitted under an older
//! generation are discarded.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::HalfOpen => "HALF_OPEN",
            CircuitState::Open => "OPEN",
        };
        f.write_str(name)
    }
}

/// Error returned by [`CircuitBreaker::execute`]
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// The breaker rejected the call without invoking the operation
    #[error("circuit breaker '{identity}' is open")]
    Open { identity: String },

    /// The operation ran and failed
    #[error(transparent)]
    Inner(E),
}

/// Read-only view of a breaker
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub identity: String,
    pub state: CircuitState,
    pub failure_count: u32,
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    generation: u64,
}

/// Failure-tracking state machine guarding one backend
pub struct CircuitBreaker {
    identity: String,
    max_failures: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker. `max_failures` is clamped to at least 1.
    pub fn new(identity: impl Into<String>, max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            identity: identity.into(),
            max_failures: max_failures.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                generation: 0,
            }),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            identity: self.identity.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
        }
    }

    /// Run `operation` under breaker protection.
    ///
    /// Returns [`CircuitError::Open`] without calling `operation` while the
    /// breaker is open. Any `Err` from the operation counts as a failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(generation) = self.admit() else {
            return Err(CircuitError::Open {
                identity: self.identity.clone(),
            });
        };

        match operation().await {
            Ok(value) => {
                self.record_success(generation);
                Ok(value)
            }
            Err(err) => {
                self.record_failure(generation);
                Err(CircuitError::Inner(err))
            }
        }
    }

    /// Returns the current generation, or `None` if the call is rejected
    fn admit(&self) -> Option<u64> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure
                .map(|at| Instant::now().saturating_duration_since(at));
            if elapsed.map_or(true, |e| e > self.reset_timeout) {
                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.failure_count = 0;
                info!(breaker = %self.identity, "Circuit breaker moved to HALF_OPEN state");
            }
        }

        if inner.state == CircuitState::Open {
            debug!(breaker = %self.identity, "Circuit breaker rejected call");
            return None;
        }

        Some(inner.generation)
    }

    fn record_failure(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(breaker = %self.identity, "Discarding failure admitted before last transition");
            return;
        }

        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        if inner.failure_count >= self.max_failures {
            self.transition(&mut inner, CircuitState::Open);
            warn!(
                breaker = %self.identity,
                failures = inner.failure_count,
                "Circuit breaker OPENED after max failures"
            );
        }
    }

    fn record_success(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(breaker = %self.identity, "Discarding success admitted before last transition");
            return;
        }

        match inner.state {
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Closed);
                inner.failure_count = 0;
                info!(breaker = %self.identity, "Circuit breaker moved to CLOSED state");
            }
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, state: CircuitState) {
        inner.state = state;
        inner.generation = inner.generation.wrapping_add(1);
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CircuitBreaker")
            .field("identity", &self.identity)
            .field("state", &snapshot.state)
            .field("failure_count", &snapshot.failure_count)
            .field("max_failures", &self.max_failures)
            .field("reset_timeout", &self.reset_timeout)
            .finish()
    }
}
