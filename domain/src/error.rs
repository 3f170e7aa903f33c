//! Domain-level error taxonomy.

use crate::status::ReservationStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by domain constructors and lifecycle transitions.
///
/// These are business-rule violations: the HTTP boundary maps them to
/// 400/422 responses and never retries them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The reservation code is not exactly 8 alphanumeric characters.
    #[error("reservation code must be exactly 8 alphanumeric characters, got {0:?}")]
    InvalidCode(String),

    /// The rental window is empty or inverted.
    #[error("dropoff_datetime must be after pickup_datetime")]
    InvalidWindow,

    /// The total amount is zero or negative.
    #[error("total_amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),

    /// A lifecycle transition that the state machine does not allow.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Status the reservation was in when the transition was attempted.
        from: ReservationStatus,
        /// Status the transition tried to reach.
        to: ReservationStatus,
    },
}
