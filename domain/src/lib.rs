//! Domain model for the Reserva car-rental reservation service.
//!
//! This crate is the dependency-free heart of the service. It contains:
//!
//! - The [`Reservation`] aggregate with its guarded lifecycle transitions
//!   and append-only status history
//! - The [`ReservationCode`] value object (8 alphanumeric characters,
//!   globally unique, immutable handle)
//! - Outbox and provider-request record types shared by the stores and the
//!   background worker
//! - Capability ports ([`ReservationStore`], [`OutboxStore`],
//!   [`PaymentGateway`], [`BookingGateway`]) implemented by the
//!   infrastructure crates and by in-memory fakes in `reserva-testing`
//!
//! # Design
//!
//! The domain never performs I/O. All suspending operations live behind the
//! port traits, which use explicit `Pin<Box<dyn Future>>` returns so they
//! stay usable as trait objects (`Arc<dyn ReservationStore>`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod code;
pub mod error;
pub mod event;
pub mod ports;
pub mod request;
pub mod reservation;
pub mod status;

pub use code::ReservationCode;
pub use error::DomainError;
pub use event::{DomainEvent, OutboxEvent, OutboxEventType, OutboxStatus};
pub use ports::{
    BookingGateway, DispatchResult, GatewayError, OutboxStore, PaymentGateway, PortFuture,
    ReservationStore, StoreError, StoreTx,
};
pub use request::{ProviderRequest, ProviderRequestStatus, ProviderRequestType};
pub use reservation::{Reservation, Snapshot, StatusChange};
pub use status::ReservationStatus;
