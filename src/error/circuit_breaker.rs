/// Circuit breaker pattern - stops calling chronically failing operations
///
/// States, tracked per operation key:
/// - Closed: normal operation; each success heals one recorded failure
/// - Open: calls are rejected with [`CheckupError::CircuitOpen`] until the
///   recovery timeout has elapsed since the last failure
/// - HalfOpen: trial calls pass; enough consecutive successes close the
///   circuit, any failure reopens it
use crate::CheckupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    /// Normal operation
    Closed,

    /// Too many failures, fail fast
    Open,

    /// Testing if the operation recovered
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failures (net of healing successes) before opening the circuit
    pub failure_threshold: u32,

    /// Consecutive half-open successes needed to close the circuit
    pub success_threshold: u32,

    /// Time after the last failure before a trial call is allowed
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// State of a single operation key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub status: CircuitStatus,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    last_failure_at: Option<Instant>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            status: CircuitStatus::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            last_failure_at: None,
        }
    }
}

/// Table of circuit breakers keyed by operation name
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    states: Mutex<BTreeMap<String, CircuitBreakerState>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            states: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn states(&self) -> MutexGuard<'_, BTreeMap<String, CircuitBreakerState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute `operation` under the breaker for `key`.
    ///
    /// While the circuit is open and the cooldown has not elapsed the
    /// operation is not invoked at all.
    pub async fn execute<T, E, F, Fut>(&self, key: &str, operation: F) -> Result<T, E>
    where
        E: From<CheckupError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit(key).map_err(E::from)?;

        match operation().await {
            Ok(value) => {
                self.record_success(key);
                Ok(value)
            }
            Err(error) => {
                self.record_failure(key);
                Err(error)
            }
        }
    }

    /// Decide whether a call may proceed, moving Open to HalfOpen once the
    /// cooldown has passed
    fn admit(&self, key: &str) -> Result<(), CheckupError> {
        let mut states = self.states();
        let Some(state) = states.get_mut(key) else {
            return Ok(());
        };

        if state.status != CircuitStatus::Open {
            return Ok(());
        }

        let elapsed = state
            .last_failure_at
            .map(|at| at.elapsed())
            .unwrap_or(self.config.recovery_timeout);

        if elapsed >= self.config.recovery_timeout {
            state.status = CircuitStatus::HalfOpen;
            state.success_count = 0;
            tracing::info!(key = key, "Circuit breaker transitioning to HalfOpen");
            Ok(())
        } else {
            let remaining = self.config.recovery_timeout - elapsed;
            tracing::warn!(
                key = key,
                remaining = %humantime::format_duration(Duration::from_secs(remaining.as_secs())),
                "Circuit breaker is OPEN, failing fast"
            );
            Err(CheckupError::CircuitOpen {
                key: key.to_string(),
                remaining_secs: remaining.as_secs_f64(),
            })
        }
    }

    /// Record a successful call
    pub fn record_success(&self, key: &str) {
        let mut states = self.states();
        let state = states.entry(key.to_string()).or_default();

        match state.status {
            CircuitStatus::Closed => {
                state.failure_count = state.failure_count.saturating_sub(1);
            }
            CircuitStatus::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    state.status = CircuitStatus::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    tracing::info!(
                        key = key,
                        successes = self.config.success_threshold,
                        "Circuit breaker CLOSED"
                    );
                }
            }
            CircuitStatus::Open => {
                tracing::warn!(key = key, "Success recorded while circuit was OPEN - resetting");
                *state = CircuitBreakerState::default();
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self, key: &str) {
        let mut states = self.states();
        let state = states.entry(key.to_string()).or_default();
        state.last_failure_at = Some(Instant::now());
        state.last_failure_time = Some(Utc::now());

        match state.status {
            CircuitStatus::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    state.status = CircuitStatus::Open;
                    tracing::warn!(
                        key = key,
                        failures = state.failure_count,
                        "Circuit breaker OPENED"
                    );
                }
            }
            CircuitStatus::HalfOpen => {
                state.status = CircuitStatus::Open;
                state.success_count = 0;
                tracing::warn!(key = key, "Circuit breaker REOPENED after failure in HalfOpen state");
            }
            CircuitStatus::Open => {}
        }
    }

    pub fn status(&self, key: &str) -> CircuitStatus {
        self.states()
            .get(key)
            .map(|s| s.status)
            .unwrap_or(CircuitStatus::Closed)
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.status(key) == CircuitStatus::Open
    }

    pub fn state(&self, key: &str) -> Option<CircuitBreakerState> {
        self.states().get(key).cloned()
    }

    /// Copy of every tracked key
    pub fn snapshot(&self) -> BTreeMap<String, CircuitBreakerState> {
        self.states().clone()
    }

    /// Reset one key to Closed; returns false if the key was unknown
    pub fn reset(&self, key: &str) -> bool {
        let reset = self.states().remove(key).is_some();
        if reset {
            tracing::info!(key = key, "Circuit breaker manually reset to CLOSED");
        }
        reset
    }

    /// Reset every key, returning how many were tracked
    pub fn reset_all(&self) -> usize {
        let mut states = self.states();
        let count = states.len();
        states.clear();
        tracing::info!(count = count, "All circuit breakers reset");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(failures: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: failures,
            success_threshold: 3,
            recovery_timeout: timeout,
        })
    }

    async fn fail(cb: &CircuitBreaker, key: &str) -> Result<(), CheckupError> {
        cb.execute(key, || async { Err(CheckupError::Transfer("failure".into())) })
            .await
    }

    async fn succeed(cb: &CircuitBreaker, key: &str) -> Result<u32, CheckupError> {
        cb.execute(key, || async { Ok(42) }).await
    }

    #[tokio::test]
    async fn test_closed_state_passes_calls() {
        let cb = breaker(3, Duration::from_secs(1));
        assert_eq!(succeed(&cb, "op").await.unwrap(), 42);
        assert_eq!(cb.status("op"), CircuitStatus::Closed);
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_skips_operation() {
        let cb = breaker(3, Duration::from_secs(60));
        for _ in 0..3 {
            let _ = fail(&cb, "op").await;
        }
        assert!(cb.is_open("op"));

        let calls = AtomicU32::new(0);
        let result: Result<(), CheckupError> = cb
            .execute("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        match result {
            Err(CheckupError::CircuitOpen { key, remaining_secs }) => {
                assert_eq!(key, "op");
                assert!(remaining_secs > 0.0 && remaining_secs <= 60.0);
            }
            other => panic!("expected CircuitOpen, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cb = breaker(2, Duration::from_secs(60));
        for _ in 0..2 {
            let _ = fail(&cb, "broken").await;
        }
        assert!(cb.is_open("broken"));
        assert!(succeed(&cb, "healthy").await.is_ok());
    }

    #[tokio::test]
    async fn test_success_heals_one_failure_when_closed() {
        let cb = breaker(3, Duration::from_secs(60));
        let _ = fail(&cb, "op").await;
        let _ = fail(&cb, "op").await;
        let _ = succeed(&cb, "op").await;
        assert_eq!(cb.state("op").unwrap().failure_count, 1);

        // one more failure is not enough to open
        let _ = fail(&cb, "op").await;
        assert!(!cb.is_open("op"));

        let _ = succeed(&cb, "op").await;
        let _ = succeed(&cb, "op").await;
        let _ = succeed(&cb, "op").await;
        assert_eq!(cb.state("op").unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_three_successes() {
        let cb = breaker(2, Duration::from_millis(50));
        for _ in 0..2 {
            let _ = fail(&cb, "op").await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(succeed(&cb, "op").await.is_ok());
        assert_eq!(cb.status("op"), CircuitStatus::HalfOpen);
        assert!(succeed(&cb, "op").await.is_ok());
        assert_eq!(cb.status("op"), CircuitStatus::HalfOpen);
        assert!(succeed(&cb, "op").await.is_ok());
        assert_eq!(cb.status("op"), CircuitStatus::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(2, Duration::from_millis(50));
        for _ in 0..2 {
            let _ = fail(&cb, "op").await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(succeed(&cb, "op").await.is_ok());
        let _ = fail(&cb, "op").await;
        assert!(cb.is_open("op"));
        assert!(matches!(
            succeed(&cb, "op").await,
            Err(CheckupError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset() {
        let cb = breaker(1, Duration::from_secs(60));
        let _ = fail(&cb, "a").await;
        let _ = fail(&cb, "b").await;
        assert!(cb.is_open("a"));

        assert!(cb.reset("a"));
        assert!(!cb.is_open("a"));
        assert!(!cb.reset("missing"));

        assert_eq!(cb.reset_all(), 1);
        assert!(cb.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_works_with_anyhow_errors() {
        let cb = breaker(1, Duration::from_secs(60));
        let _: anyhow::Result<()> = cb.execute("op", || async { Err(anyhow::anyhow!("x")) }).await;

        let result: anyhow::Result<()> = cb.execute("op", || async { Ok(()) }).await;
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckupError>(),
            Some(CheckupError::CircuitOpen { .. })
        ));
    }
}
