//! Capability ports implemented by the infrastructure crates.
//!
//! The application layer depends only on these traits. Production
//! implementations live in `reserva-postgres` (stores) and
//! `reserva-providers` (gateways); tests substitute the in-memory fakes from
//! `reserva-testing`.
//!
//! # Dyn compatibility
//!
//! All traits use explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so they can be held as trait objects
//! (`Arc<dyn ReservationStore>`, `Box<dyn StoreTx>`).

use crate::code::ReservationCode;
use crate::event::{DomainEvent, OutboxEvent};
use crate::request::{ProviderRequest, ProviderRequestType};
use crate::reservation::{Reservation, StatusChange};
use crate::status::ReservationStatus;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by all port methods.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors surfaced by store implementations.
///
/// Stores never retry; retries are the caller's concern.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The unique index on `reservation_code` rejected an insert.
    ///
    /// The code generator catches this during collision retry; anywhere else
    /// it surfaces as a 500.
    #[error("duplicate reservation code: {0}")]
    DuplicateCode(ReservationCode),

    /// A reservation referenced by code does not exist.
    #[error("reservation not found: {0}")]
    NotFound(ReservationCode),

    /// Any other I/O or driver failure.
    #[error("store error: {0}")]
    Database(String),
}

/// Errors surfaced by gateway implementations.
///
/// The HTTP adapters in `reserva-providers` are total (every exit path maps
/// to a [`DispatchResult`]) and never return this; it exists so that test
/// doubles can simulate an adapter blowing up, which the outbox worker must
/// convert into a FAILED event rather than a crashed loop.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The adapter could not produce a response envelope at all.
    #[error("provider dispatch failed: {0}")]
    Dispatch(String),
}

/// Total outcome of one external provider call.
///
/// `status` carries a short label (`"SUCCESS"`, `"TIMEOUT"`,
/// `"CIRCUIT_OPEN"`, `"FAILED"`, or the provider's own uppercased status).
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    /// Whether the provider confirmed the leg.
    pub success: bool,
    /// Short outcome label.
    pub status: String,
    /// Response body or error detail, when available.
    pub payload: Option<serde_json::Value>,
}

impl DispatchResult {
    /// Successful outcome with the given label and response payload.
    #[must_use]
    pub fn success(status: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            status: status.into(),
            payload,
        }
    }

    /// Failed outcome with the given label and optional detail.
    #[must_use]
    pub fn failure(status: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            success: false,
            status: status.into(),
            payload,
        }
    }
}

/// Durable reservation state: reads plus transaction scopes.
///
/// Writes that must be atomic (reservation + outbox intents, provider
/// request + status + history) go through [`ReservationStore::begin`] and the
/// returned [`StoreTx`].
pub trait ReservationStore: Send + Sync {
    /// Open a transaction covering reservations, outbox intents, provider
    /// requests and status history.
    fn begin(&self) -> PortFuture<'_, Result<Box<dyn StoreTx>, StoreError>>;

    /// Load a reservation by code, `None` when absent.
    fn find_by_code(
        &self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<Option<Reservation>, StoreError>>;

    /// Whether a reservation with this code exists.
    fn exists_code(&self, code: ReservationCode) -> PortFuture<'_, Result<bool, StoreError>>;

    /// Number of SUCCESS provider-request rows for `(code, request_type)`.
    fn count_successful_requests(
        &self,
        code: ReservationCode,
        request_type: ProviderRequestType,
    ) -> PortFuture<'_, Result<i64, StoreError>>;

    /// Ordered status history for a reservation.
    fn status_history(
        &self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<Vec<StatusChange>, StoreError>>;
}

/// One open store transaction.
///
/// Dropping a transaction without calling [`StoreTx::commit`] rolls every
/// buffered write back; this is the all-or-nothing guarantee the
/// create-reservation use case relies on.
pub trait StoreTx: Send {
    /// Insert-or-update a reservation by its code.
    fn save_reservation(
        &mut self,
        reservation: Reservation,
    ) -> PortFuture<'_, Result<(), StoreError>>;

    /// Append a batch of outbox dispatch intents.
    fn append_outbox(&mut self, events: Vec<DomainEvent>) -> PortFuture<'_, Result<(), StoreError>>;

    /// Current status of a reservation, read inside this transaction.
    fn reservation_status(
        &mut self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<ReservationStatus, StoreError>>;

    /// Insert one immutable provider-request row.
    fn insert_provider_request(
        &mut self,
        request: ProviderRequest,
    ) -> PortFuture<'_, Result<(), StoreError>>;

    /// Number of SUCCESS provider-request rows for `(code, request_type)`,
    /// read inside this transaction.
    fn count_successful_requests(
        &mut self,
        code: ReservationCode,
        request_type: ProviderRequestType,
    ) -> PortFuture<'_, Result<i64, StoreError>>;

    /// Overwrite the current status of a reservation.
    ///
    /// Must be paired with [`StoreTx::append_status_history`] in the same
    /// transaction; the reconciler owns that pairing.
    fn update_status(
        &mut self,
        code: ReservationCode,
        status: ReservationStatus,
    ) -> PortFuture<'_, Result<(), StoreError>>;

    /// Append one status-history row.
    fn append_status_history(
        &mut self,
        code: ReservationCode,
        change: StatusChange,
    ) -> PortFuture<'_, Result<(), StoreError>>;

    /// Commit every buffered write.
    fn commit(self: Box<Self>) -> PortFuture<'static, Result<(), StoreError>>;
}

/// Worker-side view of the outbox table.
///
/// Each method is a short, row-local operation; the worker deliberately does
/// not hold a transaction across provider I/O. The PENDING/FAILED →
/// PROCESSED transition is linearized by the row-local update.
pub trait OutboxStore: Send + Sync {
    /// Ids of up to `limit` rows with status PENDING or FAILED, ascending.
    fn claim_pending(&self, limit: usize) -> PortFuture<'_, Result<Vec<i64>, StoreError>>;

    /// Load one outbox row, `None` when the id is gone.
    fn load(&self, event_id: i64) -> PortFuture<'_, Result<Option<OutboxEvent>, StoreError>>;

    /// Mark a row PROCESSED and clear its `last_error`.
    fn mark_processed(&self, event_id: i64) -> PortFuture<'_, Result<(), StoreError>>;

    /// Mark a row FAILED and store the error durably; the row stays eligible
    /// for the next poll.
    fn mark_failed(
        &self,
        event_id: i64,
        last_error: String,
    ) -> PortFuture<'_, Result<(), StoreError>>;
}

/// Payment provider adapter.
pub trait PaymentGateway: Send + Sync {
    /// Charge the reservation's total amount.
    fn process_payment(
        &self,
        reservation: Reservation,
    ) -> PortFuture<'_, Result<DispatchResult, GatewayError>>;
}

/// Supplier booking adapter.
pub trait BookingGateway: Send + Sync {
    /// Create the booking at the supplier.
    fn create_booking(
        &self,
        reservation: Reservation,
    ) -> PortFuture<'_, Result<DispatchResult, GatewayError>>;
}
