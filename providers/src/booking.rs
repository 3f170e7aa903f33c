//! Supplier booking adapter.

use crate::transport::ProviderEndpoint;
use chrono::SecondsFormat;
use reserva_domain::{BookingGateway, DispatchResult, GatewayError, PortFuture, Reservation};

/// HTTP adapter for the supplier booking provider.
#[derive(Clone)]
pub struct HttpBookingGateway {
    endpoint: ProviderEndpoint,
}

impl HttpBookingGateway {
    /// Wrap a configured endpoint (typically `{base_url}/bookings`).
    #[must_use]
    pub const fn new(endpoint: ProviderEndpoint) -> Self {
        Self { endpoint }
    }
}

impl BookingGateway for HttpBookingGateway {
    fn create_booking(
        &self,
        reservation: Reservation,
    ) -> PortFuture<'_, Result<DispatchResult, GatewayError>> {
        Box::pin(async move {
            let payload = booking_payload(&reservation);
            let result = self.endpoint.dispatch(&payload).await;
            tracing::debug!(
                reservation_code = %reservation.reservation_code,
                success = result.success,
                status = %result.status,
                "booking dispatch completed"
            );
            Ok(result)
        })
    }
}

fn booking_payload(reservation: &Reservation) -> serde_json::Value {
    serde_json::json!({
        "reservation_code": reservation.reservation_code.as_str(),
        "supplier_code": reservation.supplier_code,
        "pickup_office_code": reservation.pickup_office_code,
        "dropoff_office_code": reservation.dropoff_office_code,
        "pickup_datetime": reservation.pickup_datetime.to_rfc3339_opts(SecondsFormat::Secs, true),
        "dropoff_datetime": reservation.dropoff_datetime.to_rfc3339_opts(SecondsFormat::Secs, true),
        "customer": reservation.customer_snapshot,
        "vehicle": reservation.vehicle_snapshot,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reserva_testing::ReservationFixture;

    #[test]
    fn payload_carries_offices_and_window() {
        let reservation = ReservationFixture::new("AB12CD34").build();
        let payload = booking_payload(&reservation);

        assert_eq!(payload["reservation_code"], "AB12CD34");
        assert_eq!(payload["supplier_code"], "SUP01");
        assert_eq!(payload["pickup_office_code"], "MAD01");
        assert_eq!(payload["dropoff_office_code"], "MAD02");
        assert_eq!(payload["pickup_datetime"], "2026-12-01T10:00:00Z");
        assert!(payload.get("amount").is_none(), "bookings carry no amount");
    }
}
