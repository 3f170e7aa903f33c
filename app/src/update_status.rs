//! Status reconciliation from external provider responses.

use chrono::{DateTime, Utc};
use reserva_domain::{
    ProviderRequest, ProviderRequestStatus, ProviderRequestType, ReservationCode,
    ReservationStatus, ReservationStore, StatusChange, StoreError, StoreTx,
};
use std::sync::Arc;
use thiserror::Error;

/// Input model for one external response.
#[derive(Debug, Clone)]
pub struct UpdateStatusRequest {
    /// Reservation the response belongs to.
    pub reservation_code: ReservationCode,
    /// Identifier of the responding provider.
    pub provider_code: String,
    /// Which leg responded.
    pub request_type: ProviderRequestType,
    /// Whether the provider confirmed the leg.
    pub success: bool,
    /// Payload sent to the provider, if captured.
    pub request_payload: Option<serde_json::Value>,
    /// Payload received from the provider.
    pub response_payload: Option<serde_json::Value>,
    /// When the provider responded; defaults to now (UTC).
    pub responded_at: Option<DateTime<Utc>>,
}

/// Errors from status reconciliation.
#[derive(Error, Debug)]
pub enum UpdateStatusError {
    /// The referenced reservation does not exist.
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationCode),

    /// `provider_code` was blank.
    #[error("provider_code must not be empty")]
    EmptyProviderCode,

    /// Reads or writes failed.
    #[error("store error during status reconciliation")]
    Store(#[source] StoreError),
}

impl From<StoreError> for UpdateStatusError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(code) => Self::ReservationNotFound(code),
            other => Self::Store(other),
        }
    }
}

/// Reconcile one external response into the reservation's lifecycle status.
///
/// The derivation is **monotone** and **order-insensitive**: once a SUCCESS
/// row exists for a `(reservation, request_type)` pair, that leg counts as
/// confirmed forever — a later FAILED response never revokes it. Processing
/// a payment success then a booking success, or the reverse, lands on the
/// same `SUPPLIER_CONFIRMED` state.
///
/// `CANCELLED` latches: responses arriving afterwards are still recorded as
/// provider-request rows, but the status never leaves `CANCELLED`.
pub struct UpdateReservationStatus {
    store: Arc<dyn ReservationStore>,
}

impl UpdateReservationStatus {
    /// Wire the reconciler.
    #[must_use]
    pub const fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Apply one external response; returns the resulting status.
    ///
    /// Runs in a single transaction: the provider-request insert, the status
    /// update and the history append commit together or not at all.
    ///
    /// # Errors
    ///
    /// - [`UpdateStatusError::ReservationNotFound`] when the code is unknown
    /// - [`UpdateStatusError::EmptyProviderCode`] for blank provider codes
    /// - [`UpdateStatusError::Store`] on I/O failure
    pub async fn execute(
        &self,
        request: UpdateStatusRequest,
    ) -> Result<ReservationStatus, UpdateStatusError> {
        if request.provider_code.trim().is_empty() {
            return Err(UpdateStatusError::EmptyProviderCode);
        }

        let code = request.reservation_code.clone();
        let responded_at = request.responded_at.unwrap_or_else(Utc::now);

        let mut tx = self.store.begin().await.map_err(UpdateStatusError::from)?;
        let current = tx.reservation_status(code.clone()).await?;

        self.record_response(&mut tx, &request, responded_at).await?;

        let payment_ok = leg_confirmed(&mut tx, &request, ProviderRequestType::Payment).await?;
        let booking_ok = leg_confirmed(&mut tx, &request, ProviderRequestType::Booking).await?;
        let target = resolve_status(current, payment_ok, booking_ok);

        if target != current {
            tx.update_status(code.clone(), target).await?;
            tx.append_status_history(
                code.clone(),
                StatusChange {
                    from_status: current,
                    to_status: target,
                    changed_at: responded_at,
                },
            )
            .await?;
            tracing::info!(
                reservation_code = %code,
                from_status = %current,
                to_status = %target,
                provider_code = %request.provider_code,
                request_type = %request.request_type,
                success = request.success,
                "reservation status updated"
            );
            metrics::counter!(
                "reservations.status_changed",
                "to" => target.as_str()
            )
            .increment(1);
        }

        tx.commit().await?;
        Ok(target)
    }

    /// Insert the provider-request row for this response.
    ///
    /// Redelivered SUCCESS responses are deduplicated so that at most one
    /// SUCCESS row exists per `(reservation, request_type)` pair; FAILED
    /// rows may repeat.
    async fn record_response(
        &self,
        tx: &mut Box<dyn StoreTx>,
        request: &UpdateStatusRequest,
        responded_at: DateTime<Utc>,
    ) -> Result<(), UpdateStatusError> {
        if request.success {
            let existing = tx
                .count_successful_requests(request.reservation_code.clone(), request.request_type)
                .await?;
            if existing > 0 {
                tracing::debug!(
                    reservation_code = %request.reservation_code,
                    request_type = %request.request_type,
                    "duplicate success response ignored"
                );
                return Ok(());
            }
        }

        tx.insert_provider_request(ProviderRequest {
            reservation_code: request.reservation_code.clone(),
            provider_code: request.provider_code.clone(),
            request_type: request.request_type,
            request_payload: request.request_payload.clone(),
            response_payload: request.response_payload.clone(),
            status: if request.success {
                ProviderRequestStatus::Success
            } else {
                ProviderRequestStatus::Failed
            },
            responded_at,
        })
        .await?;
        Ok(())
    }
}

/// Whether a leg counts as confirmed, given this response and the rows
/// accumulated so far.
async fn leg_confirmed(
    tx: &mut Box<dyn StoreTx>,
    request: &UpdateStatusRequest,
    leg: ProviderRequestType,
) -> Result<bool, UpdateStatusError> {
    if request.request_type == leg && request.success {
        return Ok(true);
    }
    let count = tx
        .count_successful_requests(request.reservation_code.clone(), leg)
        .await?;
    Ok(count > 0)
}

/// The status truth table.
const fn resolve_status(
    current: ReservationStatus,
    payment_ok: bool,
    booking_ok: bool,
) -> ReservationStatus {
    if matches!(current, ReservationStatus::Cancelled) {
        return ReservationStatus::Cancelled;
    }
    if payment_ok && booking_ok {
        ReservationStatus::SupplierConfirmed
    } else if payment_ok {
        ReservationStatus::Paid
    } else {
        ReservationStatus::Created
    }
}
