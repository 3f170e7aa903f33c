//! Outbox worker for the Reserva reservation service.
//!
//! The worker is the bridge between durable dispatch intents and the outside
//! world: it claims PENDING/FAILED outbox rows in small batches, dispatches
//! each through the provider gateways, routes the response into the status
//! reconciler, and records the row's outcome durably.
//!
//! Delivery is **at-least-once**: rows are marked PROCESSED only after the
//! dispatch has returned, so a crash between dispatch and mark re-delivers
//! on the next poll. External collaborators deduplicate on the reservation
//! code.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod processor;

pub use processor::{OutboxProcessor, OutboxProcessorConfig};
