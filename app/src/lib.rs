//! Application layer for the Reserva reservation service.
//!
//! Three use cases orchestrate the domain over the capability ports:
//!
//! - [`GenerateReservationCode`] — unique 8-character codes with collision
//!   retry
//! - [`CreateReservation`] — sanitize, PCI-filter, and co-persist a
//!   reservation together with exactly two outbox dispatch intents in one
//!   transaction
//! - [`UpdateReservationStatus`] — the reconciler: record each external
//!   response as an immutable provider-request row and drive the
//!   reservation's lifecycle status from the accumulated successes
//!
//! The [`security`] module holds the input sanitizer and the PCI storage
//! filter both entry points share.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod create_reservation;
pub mod generate_code;
pub mod security;
pub mod update_status;

pub use create_reservation::{CreateReservation, CreateReservationError, CreateReservationRequest};
pub use generate_code::{CodeGenerationError, GenerateReservationCode};
pub use security::SecurityError;
pub use update_status::{UpdateReservationStatus, UpdateStatusError, UpdateStatusRequest};
