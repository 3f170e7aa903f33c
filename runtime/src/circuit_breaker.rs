//! Circuit breaker for isolating failing external dependencies.
//!
//! A breaker monitors calls to one dependency and "opens" (fails fast) once
//! consecutive failures reach a threshold, protecting the service from
//! hammering a provider that is already down.
//!
//! # States
//!
//! - **Closed**: normal operation. Successes reset the failure count; each
//!   failure increments it. Reaching `failure_threshold` opens the circuit.
//! - **Open**: every call fails immediately with
//!   [`CircuitBreakerError::Open`] until `recovery_timeout` has elapsed since
//!   the circuit opened.
//! - **Half-open**: after the recovery timeout, exactly one probe call is
//!   allowed through. Success closes the circuit; failure reopens it and
//!   restarts the recovery window.
//!
//! All state mutations are serialized under a mutex so concurrent callers
//! observe the same state; the wrapped operation itself runs outside the
//! critical section. Time is injectable via [`MonotonicClock`].
//!
//! # Example
//!
//! ```rust
//! use reserva_runtime::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CircuitBreakerConfig::builder()
//!     .failure_threshold(5)
//!     .recovery_timeout(Duration::from_secs(30))
//!     .build();
//!
//! let breaker = CircuitBreaker::new(config);
//!
//! match breaker.call(|| async { Ok::<_, String>(42) }).await {
//!     Ok(result) => println!("Success: {result}"),
//!     Err(e) => println!("Failed: {e}"),
//! }
//! # }
//! ```

use crate::clock::{MonotonicClock, SystemClock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: usize,
    /// How long the circuit stays open before allowing a probe.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            failure_threshold: None,
            recovery_timeout: None,
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: Option<usize>,
    recovery_timeout: Option<Duration>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the number of consecutive failures that opens the circuit.
    #[must_use]
    pub const fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Set how long the circuit stays open before a probe is allowed.
    #[must_use]
    pub const fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(5),
            recovery_timeout: self
                .recovery_timeout
                .unwrap_or(Duration::from_secs(30)),
        }
    }
}

/// Observable circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through; failures are counted.
    Closed,
    /// Requests fail fast until the recovery timeout elapses.
    Open,
    /// A single probe request is in flight.
    HalfOpen,
}

/// Errors from circuit breaker calls.
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker is open")]
    Open,
    /// The operation ran and failed.
    #[error("operation failed: {0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: usize,
    opened_at: Option<Instant>,
}

/// Per-dependency circuit breaker.
///
/// Cheap to clone; clones share state. Construct one breaker per external
/// dependency and hand it to the adapter instance — no global singletons.
#[derive(Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
    clock: Arc<dyn MonotonicClock>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration and the system clock.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a breaker with an injected clock (test-friendly).
    #[must_use]
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
            })),
            clock,
        }
    }

    /// Current state of the circuit.
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// Current consecutive-failure count.
    pub async fn failure_count(&self) -> usize {
        self.state.lock().await.failure_count
    }

    /// Run an operation through the breaker.
    ///
    /// The admission check and the success/failure bookkeeping each take the
    /// state lock briefly; the operation itself runs without holding it.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::Open`] without invoking the operation
    /// when the circuit is open (or a probe is already in flight), and
    /// [`CircuitBreakerError::Inner`] when the operation fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.admit().await {
            metrics::counter!("circuit_breaker.rejections").increment(1);
            tracing::warn!("circuit breaker is OPEN, rejecting call");
            return Err(CircuitBreakerError::Open);
        }

        match operation().await {
            Ok(result) => {
                self.on_success().await;
                Ok(result)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Decide whether a call may proceed, transitioning OPEN → HALF_OPEN
    /// when the recovery timeout has elapsed.
    async fn admit(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.state {
            CircuitState::Closed => true,
            // Only the caller that performed the OPEN → HALF_OPEN transition
            // becomes the probe; everyone else keeps failing fast.
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map(|opened_at| self.clock.now().saturating_duration_since(opened_at));
                if elapsed.is_some_and(|e| e >= self.config.recovery_timeout) {
                    tracing::info!("circuit breaker transitioning OPEN -> HALF_OPEN");
                    state.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn on_success(&self) {
        let mut state = self.state.lock().await;
        if state.state == CircuitState::HalfOpen {
            tracing::info!("circuit breaker transitioning HALF_OPEN -> CLOSED");
        }
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.opened_at = None;
    }

    async fn on_failure(&self) {
        let mut state = self.state.lock().await;
        state.failure_count += 1;
        let should_open = state.state == CircuitState::HalfOpen
            || state.failure_count >= self.config.failure_threshold;
        if should_open {
            if state.state != CircuitState::Open {
                tracing::warn!(
                    failures = state.failure_count,
                    threshold = self.config.failure_threshold,
                    "circuit breaker transitioning {:?} -> OPEN",
                    state.state
                );
                metrics::counter!("circuit_breaker.opened").increment(1);
            }
            state.state = CircuitState::Open;
            state.opened_at = Some(self.clock.now());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Hand-driven clock for deterministic recovery windows.
    struct ManualClock {
        now: StdMutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: StdMutex::new(Instant::now()),
            }
        }

        fn advance(&self, delta: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += delta;
        }
    }

    impl MonotonicClock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn breaker_with_manual_clock(
        threshold: usize,
        recovery: Duration,
    ) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .recovery_timeout(recovery)
            .build();
        let clock_handle: Arc<dyn MonotonicClock> = Arc::clone(&clock) as Arc<dyn MonotonicClock>;
        let breaker = CircuitBreaker::with_clock(config, clock_handle);
        (breaker, clock)
    }

    async fn fail(breaker: &CircuitBreaker) {
        let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
    }

    #[tokio::test]
    async fn success_keeps_circuit_closed_and_resets_count() {
        let (breaker, _) = breaker_with_manual_clock(2, Duration::from_secs(30));

        fail(&breaker).await;
        assert_eq!(breaker.failure_count().await, 1);

        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let (breaker, _) = breaker_with_manual_clock(3, Duration::from_secs(30));

        for _ in 0..3 {
            fail(&breaker).await;
        }

        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_invoking_operation() {
        let (breaker, _) = breaker_with_manual_clock(2, Duration::from_secs(30));
        for _ in 0..2 {
            fail(&breaker).await;
        }

        let invoked = AtomicUsize::new(0);
        let result = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn probe_is_allowed_after_recovery_timeout() {
        let (breaker, clock) = breaker_with_manual_clock(1, Duration::from_secs(30));
        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Still inside the recovery window.
        clock.advance(Duration::from_secs(29));
        let early = breaker.call(|| async { Ok::<_, String>(1) }).await;
        assert!(matches!(early, Err(CircuitBreakerError::Open)));

        clock.advance(Duration::from_secs(1));
        let probe = breaker.call(|| async { Ok::<_, String>(1) }).await;
        assert!(probe.is_ok());
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn failed_probe_reopens_and_restarts_recovery_window() {
        let (breaker, clock) = breaker_with_manual_clock(1, Duration::from_secs(30));
        fail(&breaker).await;

        clock.advance(Duration::from_secs(30));
        fail(&breaker).await; // probe fails
        assert_eq!(breaker.state().await, CircuitState::Open);

        // The window restarted at the probe failure, so 29s later is still open.
        clock.advance(Duration::from_secs(29));
        let result = breaker.call(|| async { Ok::<_, String>(1) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
    }

    #[tokio::test]
    async fn half_open_admits_exactly_one_probe() {
        let (breaker, clock) = breaker_with_manual_clock(1, Duration::from_secs(30));
        fail(&breaker).await;
        clock.advance(Duration::from_secs(30));

        // First admission performs OPEN -> HALF_OPEN and becomes the probe.
        assert!(breaker.admit().await);
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        // Anyone arriving while the probe is in flight is rejected.
        assert!(!breaker.admit().await);
    }

    #[tokio::test]
    async fn concurrent_callers_observe_consistent_state() {
        let (breaker, _) = breaker_with_manual_clock(100, Duration::from_secs(30));
        let breaker = Arc::new(breaker);
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let breaker = Arc::clone(&breaker);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _ = breaker
                    .call(|| async {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(())
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }
}
