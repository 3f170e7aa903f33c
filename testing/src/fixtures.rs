//! Reservation fixtures with sensible defaults.

use chrono::{DateTime, TimeZone, Utc};
use reserva_domain::{Reservation, ReservationCode, Snapshot};
use rust_decimal::Decimal;

/// Builder for test reservations.
///
/// Defaults: supplier `SUP01`, offices `MAD01`/`MAD02`, a two-day rental
/// window in December 2026, total 180.50, and minimal customer/vehicle
/// snapshots.
#[derive(Debug, Clone)]
pub struct ReservationFixture {
    code: &'static str,
    pickup: DateTime<Utc>,
    dropoff: DateTime<Utc>,
    amount: Decimal,
    customer: Snapshot,
    vehicle: Snapshot,
}

#[allow(clippy::unwrap_used)]
fn default_window() -> (DateTime<Utc>, DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2026, 12, 1, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 12, 3, 10, 0, 0).unwrap(),
    )
}

impl ReservationFixture {
    /// Start a fixture for the given (static) reservation code.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn new(code: &'static str) -> Self {
        let (pickup, dropoff) = default_window();
        let mut customer = Snapshot::new();
        customer.insert("first_name".into(), "Ana".into());
        customer.insert("last_name".into(), "Perez".into());
        customer.insert("email".into(), "ana@example.com".into());
        let mut vehicle = Snapshot::new();
        vehicle.insert("vehicle_code".into(), "VH001".into());
        vehicle.insert("model".into(), "Corolla".into());
        vehicle.insert("category".into(), "Economy".into());
        Self {
            code,
            pickup,
            dropoff,
            amount: "180.50".parse().unwrap(),
            customer,
            vehicle,
        }
    }

    /// Override the rental window.
    #[must_use]
    pub const fn window(mut self, pickup: DateTime<Utc>, dropoff: DateTime<Utc>) -> Self {
        self.pickup = pickup;
        self.dropoff = dropoff;
        self
    }

    /// Override the total amount.
    #[must_use]
    pub const fn amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    /// Override the customer snapshot.
    #[must_use]
    pub fn customer(mut self, customer: Snapshot) -> Self {
        self.customer = customer;
        self
    }

    /// Build the reservation.
    ///
    /// # Panics
    ///
    /// Panics if the fixture was configured with invalid domain data; test
    /// fixtures are supposed to be valid.
    #[must_use]
    #[allow(clippy::unwrap_used, clippy::panic)]
    pub fn build(self) -> Reservation {
        Reservation::new(
            ReservationCode::new(self.code).unwrap(),
            "SUP01",
            "MAD01",
            "MAD02",
            self.pickup,
            self.dropoff,
            self.amount,
            self.customer,
            self.vehicle,
        )
        .unwrap()
    }
}
