//! The `Reservation` aggregate root.

use crate::code::ReservationCode;
use crate::error::DomainError;
use crate::status::ReservationStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Schema-less key/value bag for customer and vehicle snapshots.
///
/// Only sanitation and PCI filtering inspect leaf values; the rest of the
/// system carries the bag opaquely into the outbox payload and the provider
/// request bodies.
pub type Snapshot = serde_json::Map<String, serde_json::Value>;

/// One recorded status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Status before the transition.
    pub from_status: ReservationStatus,
    /// Status after the transition.
    pub to_status: ReservationStatus,
    /// Wall-clock UTC moment the transition was recorded.
    pub changed_at: DateTime<Utc>,
}

/// Reservation aggregate root.
///
/// Owns its snapshot data, current lifecycle status and append-only status
/// history. Constructors validate the rental window and the amount; the
/// `mark_*` methods enforce the lifecycle state machine:
///
/// ```text
/// CREATED → PAYMENT_IN_PROGRESS → PAID → SUPPLIER_CONFIRMED
///    └──────────────┴──────────────┴──→ CANCELLED (from any non-terminal)
/// ```
///
/// Every successful transition appends one [`StatusChange`] whose
/// `from_status` is the previous status.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    /// Immutable public identity.
    pub reservation_code: ReservationCode,
    /// Supplier the booking leg is dispatched to.
    pub supplier_code: String,
    /// Office where the vehicle is picked up.
    pub pickup_office_code: String,
    /// Office where the vehicle is dropped off.
    pub dropoff_office_code: String,
    /// Start of the rental window (timezone-aware).
    pub pickup_datetime: DateTime<Utc>,
    /// End of the rental window; strictly after pickup.
    pub dropoff_datetime: DateTime<Utc>,
    /// Total price, fixed-point with two fractional digits.
    pub total_amount: Decimal,
    /// Customer snapshot (PCI-filtered before persistence).
    pub customer_snapshot: Snapshot,
    /// Vehicle snapshot.
    pub vehicle_snapshot: Snapshot,
    /// Current lifecycle status.
    pub status: ReservationStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Ordered, append-only transition log.
    pub status_history: Vec<StatusChange>,
}

impl Reservation {
    /// Build a new reservation in the `CREATED` state.
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidWindow`] if `dropoff_datetime <= pickup_datetime`
    /// - [`DomainError::NonPositiveAmount`] if `total_amount <= 0`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reservation_code: ReservationCode,
        supplier_code: impl Into<String>,
        pickup_office_code: impl Into<String>,
        dropoff_office_code: impl Into<String>,
        pickup_datetime: DateTime<Utc>,
        dropoff_datetime: DateTime<Utc>,
        total_amount: Decimal,
        customer_snapshot: Snapshot,
        vehicle_snapshot: Snapshot,
    ) -> Result<Self, DomainError> {
        if dropoff_datetime <= pickup_datetime {
            return Err(DomainError::InvalidWindow);
        }
        if total_amount <= Decimal::ZERO {
            return Err(DomainError::NonPositiveAmount(total_amount));
        }
        Ok(Self {
            reservation_code,
            supplier_code: supplier_code.into(),
            pickup_office_code: pickup_office_code.into(),
            dropoff_office_code: dropoff_office_code.into(),
            pickup_datetime,
            dropoff_datetime,
            total_amount,
            customer_snapshot,
            vehicle_snapshot,
            status: ReservationStatus::Created,
            created_at: Utc::now(),
            status_history: Vec::new(),
        })
    }

    /// Move from `CREATED` to `PAYMENT_IN_PROGRESS`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidTransition`] when not in `CREATED`.
    pub fn mark_payment_in_progress(&mut self) -> Result<(), DomainError> {
        self.transition(
            ReservationStatus::Created,
            ReservationStatus::PaymentInProgress,
        )
    }

    /// Move from `PAYMENT_IN_PROGRESS` to `PAID`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidTransition`] when not in
    /// `PAYMENT_IN_PROGRESS`.
    pub fn mark_paid(&mut self) -> Result<(), DomainError> {
        self.transition(
            ReservationStatus::PaymentInProgress,
            ReservationStatus::Paid,
        )
    }

    /// Move from `PAID` to `SUPPLIER_CONFIRMED`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidTransition`] when not in `PAID`.
    pub fn mark_supplier_confirmed(&mut self) -> Result<(), DomainError> {
        self.transition(
            ReservationStatus::Paid,
            ReservationStatus::SupplierConfirmed,
        )
    }

    /// Whether the reservation can still be cancelled.
    #[must_use]
    pub fn can_be_cancelled(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }

    /// Cancel from any non-terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidTransition`] if already `CANCELLED`.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !self.can_be_cancelled() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: ReservationStatus::Cancelled,
            });
        }
        self.record_transition(ReservationStatus::Cancelled);
        Ok(())
    }

    fn transition(
        &mut self,
        expected: ReservationStatus,
        target: ReservationStatus,
    ) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.record_transition(target);
        Ok(())
    }

    fn record_transition(&mut self, target: ReservationStatus) {
        let previous = self.status;
        self.status = target;
        self.status_history.push(StatusChange {
            from_status: previous,
            to_status: target,
            changed_at: Utc::now(),
        });
    }
}
