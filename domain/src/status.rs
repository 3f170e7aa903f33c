//! Reservation lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a reservation.
///
/// A reservation is created at [`ReservationStatus::Created`] and advances as
/// the payment and supplier-booking legs confirm. `Cancelled` is terminal:
/// once reached, no further transitions occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Persisted, no external leg confirmed yet.
    Created,
    /// A payment attempt is in flight.
    PaymentInProgress,
    /// Payment confirmed, supplier booking still outstanding.
    Paid,
    /// Both payment and supplier booking confirmed.
    SupplierConfirmed,
    /// Terminal state; latches against any further transition.
    Cancelled,
}

impl ReservationStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::PaymentInProgress => "PAYMENT_IN_PROGRESS",
            Self::Paid => "PAID",
            Self::SupplierConfirmed => "SUPPLIER_CONFIRMED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse a database string representation.
    ///
    /// Returns `None` for unknown values so callers can surface their own
    /// error type.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "PAYMENT_IN_PROGRESS" => Some(Self::PaymentInProgress),
            "PAID" => Some(Self::Paid),
            "SUPPLIER_CONFIRMED" => Some(Self::SupplierConfirmed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn as_str_parse_roundtrip() {
        for status in [
            ReservationStatus::Created,
            ReservationStatus::PaymentInProgress,
            ReservationStatus::Paid,
            ReservationStatus::SupplierConfirmed,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(ReservationStatus::parse("REFUNDED"), None);
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ReservationStatus::PaymentInProgress).unwrap();
        assert_eq!(json, "\"PAYMENT_IN_PROGRESS\"");
    }
}
