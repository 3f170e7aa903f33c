//! The outbox processing loop.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reserva_app::{UpdateReservationStatus, UpdateStatusRequest};
use reserva_domain::{
    BookingGateway, DispatchResult, GatewayError, OutboxEvent, OutboxEventType, OutboxStatus,
    OutboxStore, PaymentGateway, ProviderRequestType, Reservation, ReservationCode, Snapshot,
    StoreError,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct OutboxProcessorConfig {
    /// Maximum rows claimed per iteration.
    pub batch_size: usize,
    /// Sleep between polls (interrupted by the stop signal).
    pub poll_interval: Duration,
    /// Provider code recorded for payment responses.
    pub payment_provider_code: String,
    /// Provider code recorded for booking responses.
    pub booking_provider_code: String,
}

impl Default for OutboxProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            poll_interval: Duration::from_secs(5),
            payment_provider_code: "stripe".to_string(),
            booking_provider_code: "supplier".to_string(),
        }
    }
}

/// Long-lived loop that drains the outbox.
///
/// Each claimed row is handled in its own error scope and its own short
/// store writes — a failing event never poisons the rest of the batch, and
/// no database transaction is held across provider I/O. If one adapter is
/// healthy, events of the healthy type keep draining even while the other
/// type is tripping its circuit breaker.
///
/// # Example
///
/// ```ignore
/// let (processor, shutdown) = OutboxProcessor::new(
///     outbox_store,
///     payment_gateway,
///     booking_gateway,
///     reconciler,
///     OutboxProcessorConfig::default(),
/// );
/// let handle = tokio::spawn(processor.run());
///
/// // On SIGTERM:
/// shutdown.send(true).ok();
/// handle.await?;
/// ```
pub struct OutboxProcessor {
    outbox: Arc<dyn OutboxStore>,
    payment: Arc<dyn PaymentGateway>,
    booking: Arc<dyn BookingGateway>,
    reconciler: Arc<UpdateReservationStatus>,
    config: OutboxProcessorConfig,
    shutdown: watch::Receiver<bool>,
}

impl OutboxProcessor {
    /// Wire the worker. Returns the processor and the stop signal sender;
    /// send `true` to make the loop exit at the next poll boundary (the
    /// in-flight event is completed first).
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        payment: Arc<dyn PaymentGateway>,
        booking: Arc<dyn BookingGateway>,
        reconciler: Arc<UpdateReservationStatus>,
        config: OutboxProcessorConfig,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let processor = Self {
            outbox,
            payment,
            booking,
            reconciler,
            config,
            shutdown: shutdown_rx,
        };
        (processor, shutdown_tx)
    }

    /// Run until the stop signal fires.
    pub async fn run(mut self) {
        tracing::info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis(),
            "starting outbox processor"
        );

        while !*self.shutdown.borrow() {
            match self.process_pending_once(self.config.batch_size).await {
                Ok(0) => {}
                Ok(processed) => tracing::debug!(processed, "outbox batch drained"),
                Err(err) => tracing::error!(error = %err, "outbox batch failed"),
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                changed = self.shutdown.changed() => {
                    // A dropped sender counts as a stop signal.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("outbox processor stopped");
    }

    /// Claim and process one batch; returns how many events were marked
    /// PROCESSED.
    ///
    /// # Errors
    ///
    /// Only the claim query itself can fail the batch; per-event failures
    /// are recorded on the row and do not propagate.
    pub async fn process_pending_once(&self, limit: usize) -> Result<usize, StoreError> {
        let event_ids = self.outbox.claim_pending(limit).await?;

        let mut processed = 0;
        for event_id in event_ids {
            match self.process_event_by_id(event_id).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(err) => {
                    // The row-level failure could not even be recorded;
                    // leave the row for the next poll.
                    tracing::error!(event_id, error = %err, "failed to record outbox outcome");
                }
            }
        }
        Ok(processed)
    }

    /// Handle one row end to end; `Ok(true)` when it ended PROCESSED.
    async fn process_event_by_id(&self, event_id: i64) -> Result<bool, StoreError> {
        let Some(event) = self.outbox.load(event_id).await? else {
            return Ok(false);
        };
        if event.status == OutboxStatus::Processed {
            // Another worker finished it between claim and load.
            return Ok(false);
        }

        match self.dispatch(&event).await {
            Ok(result) if result.success => {
                self.outbox.mark_processed(event.id).await?;
                metrics::counter!("outbox.processed").increment(1);
                tracing::info!(
                    event_id = event.id,
                    aggregate_id = %event.aggregate_id,
                    event_type = %event.event_type,
                    "outbox event processed"
                );
                Ok(true)
            }
            Ok(result) => {
                let reason = format!("dispatch returned {}", result.status);
                self.fail_event(&event, reason).await?;
                Ok(false)
            }
            Err(err) => {
                self.fail_event(&event, err.to_string()).await?;
                Ok(false)
            }
        }
    }

    /// Route the event to its gateway and feed the response into the
    /// reconciler.
    async fn dispatch(&self, event: &OutboxEvent) -> Result<DispatchResult, DispatchError> {
        let Some(event_type) = OutboxEventType::parse(&event.event_type) else {
            return Err(DispatchError::UnknownEventType(event.event_type.clone()));
        };
        let reservation = reservation_from_payload(&event.aggregate_id, &event.payload)
            .map_err(DispatchError::Payload)?;
        let code = reservation.reservation_code.clone();

        let (result, request_type, provider_code) = match event_type {
            OutboxEventType::PaymentRequested => (
                self.payment.process_payment(reservation).await?,
                ProviderRequestType::Payment,
                self.config.payment_provider_code.clone(),
            ),
            OutboxEventType::BookingRequested => (
                self.booking.create_booking(reservation).await?,
                ProviderRequestType::Booking,
                self.config.booking_provider_code.clone(),
            ),
        };

        self.reconciler
            .execute(UpdateStatusRequest {
                reservation_code: code,
                provider_code,
                request_type,
                success: result.success,
                request_payload: Some(event.payload.clone()),
                response_payload: result.payload.clone(),
                responded_at: None,
            })
            .await
            .map_err(|err| DispatchError::Reconcile(err.to_string()))?;

        Ok(result)
    }

    async fn fail_event(&self, event: &OutboxEvent, reason: String) -> Result<(), StoreError> {
        tracing::warn!(
            event_id = event.id,
            aggregate_id = %event.aggregate_id,
            event_type = %event.event_type,
            error = %reason,
            "outbox event failed, will retry on next poll"
        );
        metrics::counter!("outbox.failed").increment(1);
        self.outbox.mark_failed(event.id, reason).await
    }
}

/// Internal dispatch failure; always ends up in the row's `last_error`.
#[derive(Debug)]
enum DispatchError {
    UnknownEventType(String),
    Payload(String),
    Gateway(GatewayError),
    Reconcile(String),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEventType(ty) => write!(f, "unsupported outbox event type: {ty}"),
            Self::Payload(reason) => write!(f, "invalid outbox payload: {reason}"),
            Self::Gateway(err) => write!(f, "{err}"),
            Self::Reconcile(reason) => write!(f, "status reconciliation failed: {reason}"),
        }
    }
}

impl From<GatewayError> for DispatchError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err)
    }
}

/// Rebuild a reservation from the snapshot an outbox payload carries.
///
/// Missing or malformed fields fall back to defensive defaults so that an
/// old or partially written payload still dispatches: pickup defaults to
/// now, dropoff to pickup + 1h, the amount to 1.00, codes to `"UNKNOWN"`.
fn reservation_from_payload(
    aggregate_id: &str,
    payload: &serde_json::Value,
) -> Result<Reservation, String> {
    let snapshot = payload.get("reservation").cloned().unwrap_or_default();

    let pickup = parse_datetime(snapshot.get("pickup_datetime")).unwrap_or_else(Utc::now);
    let dropoff = parse_datetime(snapshot.get("dropoff_datetime"))
        .unwrap_or_else(|| pickup + ChronoDuration::hours(1));
    let total_amount = parse_amount(snapshot.get("total_amount"));

    let code = ReservationCode::new(aggregate_id).map_err(|err| err.to_string())?;
    Reservation::new(
        code,
        string_or_unknown(snapshot.get("supplier_code")),
        string_or_unknown(snapshot.get("pickup_office_code")),
        string_or_unknown(snapshot.get("dropoff_office_code")),
        pickup,
        dropoff,
        total_amount,
        object_or_empty(snapshot.get("customer_snapshot")),
        object_or_empty(snapshot.get("vehicle_snapshot")),
    )
    .map_err(|err| err.to_string())
}

fn parse_datetime(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_amount(value: Option<&serde_json::Value>) -> Decimal {
    let fallback = Decimal::new(100, 2); // 1.00
    let parsed = match value {
        Some(serde_json::Value::String(raw)) => raw.parse::<Decimal>().ok(),
        Some(serde_json::Value::Number(raw)) => raw.to_string().parse::<Decimal>().ok(),
        _ => None,
    };
    match parsed {
        Some(amount) if amount > Decimal::ZERO => amount,
        _ => fallback,
    }
}

fn string_or_unknown(value: Option<&serde_json::Value>) -> String {
    value
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("UNKNOWN")
        .to_string()
}

fn object_or_empty(value: Option<&serde_json::Value>) -> Snapshot {
    match value {
        Some(serde_json::Value::Object(map)) => map.clone(),
        _ => Snapshot::new(),
    }
}
