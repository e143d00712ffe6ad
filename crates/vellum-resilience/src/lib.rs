//! Pure-logic fault tolerance primitives shared by the parser and embedding
//! clients: a circuit breaker and a sliding-window rate limiter.
//!
//! This crate has no knowledge of HTTP, the job store, or any other
//! application concern; it is deliberately dependency-light so it can be
//! reused anywhere a remote call needs protecting.

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitCallError, CircuitState};
pub use rate_limiter::{RateLimiter, estimate_tokens};
