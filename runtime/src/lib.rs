//! Fault-isolation primitives for the Reserva reservation service.
//!
//! External providers fail: connections reset, responses time out, whole
//! services go down for minutes. This crate supplies the two envelopes the
//! provider adapters compose around every outbound call:
//!
//! - [`retry::RetryPolicy`] — bounded retries with exponential backoff
//! - [`circuit_breaker::CircuitBreaker`] — per-dependency failure isolator
//!
//! Composition order is retry on the outside, breaker on the inside, so a
//! tripped breaker short-circuits the remaining retry attempts instead of
//! hammering a dependency that is already down.
//!
//! Both primitives are I/O-free in their state handling: the breaker guards
//! its state with a mutex whose critical section never awaits the wrapped
//! operation, and time is injectable for deterministic tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod clock;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use clock::{MonotonicClock, SystemClock};
pub use retry::{retry_with_backoff, retry_with_predicate, RetryPolicy};
