//! Circuit breaker guarding calls to the parser and embedding services
//!
//! Three states:
//! - Closed: calls pass through normally.
//! - Open: calls fail fast with [`CircuitCallError::Open`].
//! - HalfOpen: a single probe call is allowed through to test recovery.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Outcome of a breaker-gated call: either the breaker itself refused the
/// call, or the wrapped operation ran and produced its own error.
#[derive(Debug)]
pub enum CircuitCallError<E> {
    Open,
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitCallError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "circuit breaker is open"),
            Self::Inner(err) => write!(f, "{err}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitCallError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open => None,
            Self::Inner(err) => Some(err),
        }
    }
}

/// Current state of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    /// `next_probe` is when the breaker allows its next half-open attempt.
    Open { next_probe: Instant },
    HalfOpen,
}

/// Tunables for a circuit breaker instance.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: usize,
    /// Time since the last failure before a half-open probe is allowed.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: usize,
}

/// Per-service circuit breaker. A single failing success closes the circuit
/// from half-open, matching the external services' all-or-nothing health
/// model: there is no partial-recovery signal worth waiting on.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
            })),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Run `op` gated by the breaker: fails fast with `CircuitCallError::Open`
    /// while open, allows exactly one call through while half-open, and
    /// otherwise runs normally. Does not retry; callers own their own retry
    /// loop.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.admit().await?;

        match op().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitCallError::Inner(err))
            }
        }
    }

    async fn admit<E>(&self) -> Result<(), CircuitCallError<E>> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open { next_probe } => {
                if Instant::now() >= next_probe {
                    inner.state = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(CircuitCallError::Open)
                }
            }
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures = 0;
        inner.state = CircuitState::Closed;
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open {
                    next_probe: Instant::now() + self.config.recovery_timeout,
                };
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open {
                        next_probe: Instant::now() + self.config.recovery_timeout,
                    };
                }
            }
            CircuitState::Open { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fail(_unit: ()) -> Result<(), &'static str> {
        Err("boom")
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
        });

        for _ in 0..3 {
            let _ = breaker.call(|| fail(())).await;
        }

        assert!(matches!(breaker.state().await, CircuitState::Open { .. }));
    }

    #[tokio::test]
    async fn sixth_call_fails_fast_without_running_op() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        });

        for _ in 0..5 {
            let _ = breaker.call(|| fail(())).await;
        }

        let mut called = false;
        let result = breaker
            .call(|| {
                called = true;
                async { Ok::<(), &'static str>(()) }
            })
            .await;

        assert!(matches!(result, Err(CircuitCallError::Open)));
        assert!(!called);
    }

    #[tokio::test]
    async fn half_open_probe_closes_on_single_success() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(20),
        });

        let _ = breaker.call(|| fail(())).await;
        assert!(matches!(breaker.state().await, CircuitState::Open { .. }));

        tokio::time::sleep(Duration::from_millis(25)).await;

        let result = breaker.call(|| async { Ok::<(), &'static str>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_circuit() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(20),
        });

        let _ = breaker.call(|| fail(())).await;
        tokio::time::sleep(Duration::from_millis(25)).await;

        let _ = breaker.call(|| fail(())).await;

        assert!(matches!(breaker.state().await, CircuitState::Open { .. }));
    }
}
