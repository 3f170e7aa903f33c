//! Payment provider adapter.

use crate::transport::ProviderEndpoint;
use chrono::SecondsFormat;
use reserva_domain::{DispatchResult, GatewayError, PaymentGateway, PortFuture, Reservation};

/// Currency every payment is charged in.
const PAYMENT_CURRENCY: &str = "EUR";

/// HTTP adapter for the payment provider.
///
/// Serializes a payment payload from the reservation snapshot and POSTs it
/// to the endpoint; the endpoint's retry/breaker envelope and total failure
/// mapping make [`PaymentGateway::process_payment`] infallible in practice.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    endpoint: ProviderEndpoint,
}

impl HttpPaymentGateway {
    /// Wrap a configured endpoint (typically `{base_url}/payments`).
    #[must_use]
    pub const fn new(endpoint: ProviderEndpoint) -> Self {
        Self { endpoint }
    }
}

impl PaymentGateway for HttpPaymentGateway {
    fn process_payment(
        &self,
        reservation: Reservation,
    ) -> PortFuture<'_, Result<DispatchResult, GatewayError>> {
        Box::pin(async move {
            let payload = payment_payload(&reservation);
            let result = self.endpoint.dispatch(&payload).await;
            tracing::debug!(
                reservation_code = %reservation.reservation_code,
                success = result.success,
                status = %result.status,
                "payment dispatch completed"
            );
            Ok(result)
        })
    }
}

fn payment_payload(reservation: &Reservation) -> serde_json::Value {
    serde_json::json!({
        "reservation_code": reservation.reservation_code.as_str(),
        "amount": reservation.total_amount.to_string(),
        "currency": PAYMENT_CURRENCY,
        "supplier_code": reservation.supplier_code,
        "pickup_datetime": reservation.pickup_datetime.to_rfc3339_opts(SecondsFormat::Secs, true),
        "dropoff_datetime": reservation.dropoff_datetime.to_rfc3339_opts(SecondsFormat::Secs, true),
        "customer": reservation.customer_snapshot,
        "vehicle": reservation.vehicle_snapshot,
    })
}
