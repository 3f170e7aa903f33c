//! HTTP adapters for the Reserva external providers.
//!
//! Two stateless adapters translate reservation snapshots into provider
//! calls:
//!
//! - [`HttpPaymentGateway`] — `POST {base_url}/payments`
//! - [`HttpBookingGateway`] — `POST {base_url}/bookings`
//!
//! Both compose the same resilience envelope (outer to inner): a
//! [`reserva_runtime::RetryPolicy`] wraps a
//! [`reserva_runtime::CircuitBreaker`] which wraps the actual request, so a
//! tripped breaker short-circuits the remaining retry attempts.
//!
//! The failure mapping is **total**: every exit path becomes a
//! [`reserva_domain::DispatchResult`] — timeout → `TIMEOUT`, open breaker →
//! `CIRCUIT_OPEN`, transport/HTTP error → `FAILED`, 2xx → success with the
//! provider's own uppercased status label. The adapters never raise.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod booking;
pub mod payment;
mod transport;

pub use booking::HttpBookingGateway;
pub use payment::HttpPaymentGateway;
pub use transport::ProviderEndpoint;
