//! Outbox event types and the reservation dispatch-event builder.

use crate::reservation::Reservation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// The two external dispatch intents a reservation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxEventType {
    /// Dispatch the payment leg to the payment provider.
    PaymentRequested,
    /// Dispatch the booking leg to the supplier provider.
    BookingRequested,
}

impl OutboxEventType {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PaymentRequested => "PAYMENT_REQUESTED",
            Self::BookingRequested => "BOOKING_REQUESTED",
        }
    }

    /// Parse a database string representation; `None` for unknown values.
    ///
    /// The worker keeps raw strings around so that an unknown event type can
    /// be marked FAILED with a durable error instead of being dropped.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAYMENT_REQUESTED" => Some(Self::PaymentRequested),
            "BOOKING_REQUESTED" => Some(Self::BookingRequested),
            _ => None,
        }
    }
}

impl fmt::Display for OutboxEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing state of a durable outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Waiting for its first dispatch attempt.
    Pending,
    /// Dispatched successfully; terminal.
    Processed,
    /// Last dispatch attempt failed; eligible for the next poll.
    Failed,
}

impl OutboxStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processed => "PROCESSED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a database string representation; `None` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSED" => Some(Self::Processed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A dispatch intent produced by the create-reservation use case, before it
/// has been assigned a row id.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    /// Which external leg this intent dispatches.
    pub event_type: OutboxEventType,
    /// Reservation code the intent belongs to.
    pub aggregate_id: String,
    /// Reservation snapshot carried to the worker.
    pub payload: serde_json::Value,
}

impl DomainEvent {
    /// Build the two dispatch intents for a freshly created reservation.
    ///
    /// Exactly one `PAYMENT_REQUESTED` and one `BOOKING_REQUESTED` event are
    /// produced, both carrying the same reservation snapshot, so that the
    /// worker can rebuild the reservation without reading the store.
    #[must_use]
    pub fn for_reservation(reservation: &Reservation) -> Vec<Self> {
        let payload = reservation_payload(reservation);
        vec![
            Self {
                event_type: OutboxEventType::PaymentRequested,
                aggregate_id: reservation.reservation_code.to_string(),
                payload: payload.clone(),
            },
            Self {
                event_type: OutboxEventType::BookingRequested,
                aggregate_id: reservation.reservation_code.to_string(),
                payload,
            },
        ]
    }
}

/// Snapshot of a reservation embedded in outbox payloads.
fn reservation_payload(reservation: &Reservation) -> serde_json::Value {
    json!({
        "reservation": {
            "reservation_code": reservation.reservation_code.as_str(),
            "supplier_code": reservation.supplier_code,
            "pickup_office_code": reservation.pickup_office_code,
            "dropoff_office_code": reservation.dropoff_office_code,
            "pickup_datetime": reservation.pickup_datetime.to_rfc3339(),
            "dropoff_datetime": reservation.dropoff_datetime.to_rfc3339(),
            "total_amount": reservation.total_amount.to_string(),
            "customer_snapshot": reservation.customer_snapshot,
            "vehicle_snapshot": reservation.vehicle_snapshot,
        }
    })
}

/// A durable outbox row as read back from the store.
///
/// `event_type` stays a raw string here: rows written by older (or newer)
/// deployments may carry types this build does not know, and those must be
/// markable as FAILED rather than unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    /// Row id; drain order follows ascending ids.
    pub id: i64,
    /// Reservation code the row belongs to.
    pub aggregate_id: String,
    /// Raw event type string.
    pub event_type: String,
    /// Reservation snapshot written at creation time.
    pub payload: serde_json::Value,
    /// Processing state.
    pub status: OutboxStatus,
    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,
    /// Error from the most recent failed dispatch, if any.
    pub last_error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::code::ReservationCode;
    use crate::reservation::Snapshot;
    use chrono::TimeZone;

    fn sample_reservation() -> Reservation {
        let pickup = Utc.with_ymd_and_hms(2026, 12, 1, 10, 0, 0).unwrap();
        let dropoff = Utc.with_ymd_and_hms(2026, 12, 3, 10, 0, 0).unwrap();
        let mut customer = Snapshot::new();
        customer.insert("email".into(), "ana@example.com".into());
        Reservation::new(
            ReservationCode::new("AB12CD34").unwrap(),
            "SUP01",
            "MAD01",
            "MAD02",
            pickup,
            dropoff,
            "180.50".parse().unwrap(),
            customer,
            Snapshot::new(),
        )
        .unwrap()
    }

    #[test]
    fn builds_exactly_two_events_one_of_each_type() {
        let events = DomainEvent::for_reservation(&sample_reservation());
        assert_eq!(events.len(), 2);
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert!(types.contains(&OutboxEventType::PaymentRequested));
        assert!(types.contains(&OutboxEventType::BookingRequested));
    }

    #[test]
    fn events_share_aggregate_id_and_snapshot_payload() {
        let events = DomainEvent::for_reservation(&sample_reservation());
        assert!(events.iter().all(|e| e.aggregate_id == "AB12CD34"));
        assert_eq!(events[0].payload, events[1].payload);

        let snapshot = &events[0].payload["reservation"];
        assert_eq!(snapshot["reservation_code"], "AB12CD34");
        assert_eq!(snapshot["total_amount"], "180.50");
        assert_eq!(snapshot["customer_snapshot"]["email"], "ana@example.com");
    }

    #[test]
    fn event_type_roundtrip() {
        for ty in [
            OutboxEventType::PaymentRequested,
            OutboxEventType::BookingRequested,
        ] {
            assert_eq!(OutboxEventType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(OutboxEventType::parse("VEHICLE_WASHED"), None);
    }

    #[test]
    fn outbox_status_roundtrip() {
        for status in [
            OutboxStatus::Pending,
            OutboxStatus::Processed,
            OutboxStatus::Failed,
        ] {
            assert_eq!(OutboxStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OutboxStatus::parse("RETRYING"), None);
    }
}
