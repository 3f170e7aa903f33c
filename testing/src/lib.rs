//! Testing utilities for the Reserva reservation service.
//!
//! This crate provides the fakes the application and worker tests are built
//! on:
//!
//! - [`store::InMemoryStore`] — implements both store ports with real
//!   commit/rollback semantics: writes staged on a transaction that is
//!   dropped without committing are never observed
//! - [`gateways::ScriptedGateway`] — payment/booking stub with scripted
//!   outcomes and invocation counters
//! - [`fixtures`] — reservation builders with sensible defaults
//!
//! Everything here is deterministic; no I/O, no sleeps, no randomness.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod gateways;
pub mod store;

pub use fixtures::ReservationFixture;
pub use gateways::{ScriptedGateway, ScriptedOutcome};
pub use store::InMemoryStore;
