//! End-to-end worker scenarios over the in-memory store and stub gateways.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use reserva_app::UpdateReservationStatus;
use reserva_domain::{
    BookingGateway, DispatchResult, DomainEvent, GatewayError, OutboxStatus, OutboxStore,
    PaymentGateway, PortFuture, Reservation, ReservationStatus, ReservationStore,
};
use reserva_outbox::{OutboxProcessor, OutboxProcessorConfig};
use reserva_runtime::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use reserva_testing::{InMemoryStore, ReservationFixture, ScriptedGateway, ScriptedOutcome};
use std::sync::Arc;
use std::time::Duration;

fn processor(
    store: &Arc<InMemoryStore>,
    payment: Arc<dyn PaymentGateway>,
    booking: Arc<dyn BookingGateway>,
) -> OutboxProcessor {
    let reconciler = Arc::new(UpdateReservationStatus::new(
        Arc::clone(store) as Arc<dyn ReservationStore>
    ));
    let (processor, _shutdown) = OutboxProcessor::new(
        Arc::clone(store) as Arc<dyn OutboxStore>,
        payment,
        booking,
        reconciler,
        OutboxProcessorConfig::default(),
    );
    processor
}

async fn seed_reservation_with_events(store: &Arc<InMemoryStore>, code: &'static str) -> Reservation {
    let reservation = ReservationFixture::new(code).build();
    let mut tx = store.begin().await.unwrap();
    tx.save_reservation(reservation.clone()).await.unwrap();
    tx.append_outbox(DomainEvent::for_reservation(&reservation))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    reservation
}

#[tokio::test]
async fn happy_path_processes_both_events_and_confirms_the_reservation() {
    let store = Arc::new(InMemoryStore::new());
    let reservation = seed_reservation_with_events(&store, "AB12CD34").await;

    let worker = processor(
        &store,
        Arc::new(ScriptedGateway::always_succeeding()),
        Arc::new(ScriptedGateway::always_succeeding()),
    );

    let processed = worker.process_pending_once(10).await.unwrap();
    assert_eq!(processed, 2);

    let rows = store.outbox_rows();
    assert!(rows.iter().all(|r| r.status == OutboxStatus::Processed));
    assert!(rows.iter().all(|r| r.last_error.is_none()));

    let updated = store
        .find_by_code(reservation.reservation_code.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, ReservationStatus::SupplierConfirmed);

    let history = store
        .status_history(reservation.reservation_code)
        .await
        .unwrap();
    let transitions: Vec<_> = history
        .iter()
        .map(|c| (c.from_status, c.to_status))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (ReservationStatus::Created, ReservationStatus::Paid),
            (ReservationStatus::Paid, ReservationStatus::SupplierConfirmed),
        ]
    );
}

#[tokio::test]
async fn double_failure_then_recovery() {
    let store = Arc::new(InMemoryStore::new());
    seed_reservation_with_events(&store, "AB12CD34").await;

    let payment = ScriptedGateway::with_script(vec![ScriptedOutcome::Error("connection reset")]);
    let booking = ScriptedGateway::with_script(vec![ScriptedOutcome::Error("connection reset")]);
    let worker = processor(&store, Arc::new(payment), Arc::new(booking));

    // First tick: both adapters blow up, both events end FAILED.
    let processed = worker.process_pending_once(10).await.unwrap();
    assert_eq!(processed, 0);
    let rows = store.outbox_rows();
    assert!(rows.iter().all(|r| r.status == OutboxStatus::Failed));
    assert!(rows
        .iter()
        .all(|r| r.last_error.as_deref().unwrap().contains("connection reset")));

    // Adapters restored (scripts exhausted): next tick drains both.
    let processed = worker.process_pending_once(10).await.unwrap();
    assert_eq!(processed, 2);
    assert!(store
        .outbox_rows()
        .iter()
        .all(|r| r.status == OutboxStatus::Processed));
}

#[tokio::test]
async fn unsuccessful_dispatch_result_marks_the_event_failed() {
    let store = Arc::new(InMemoryStore::new());
    seed_reservation_with_events(&store, "AB12CD34").await;

    let payment = ScriptedGateway::with_script(vec![ScriptedOutcome::Failure("TIMEOUT")]);
    let worker = processor(
        &store,
        Arc::new(payment),
        Arc::new(ScriptedGateway::always_succeeding()),
    );

    worker.process_pending_once(10).await.unwrap();

    let rows = store.outbox_rows();
    let payment_row = rows
        .iter()
        .find(|r| r.event_type == "PAYMENT_REQUESTED")
        .unwrap();
    assert_eq!(payment_row.status, OutboxStatus::Failed);
    assert!(payment_row
        .last_error
        .as_deref()
        .unwrap()
        .contains("TIMEOUT"));

    // The booking leg drained regardless of the failing payment leg.
    let booking_row = rows
        .iter()
        .find(|r| r.event_type == "BOOKING_REQUESTED")
        .unwrap();
    assert_eq!(booking_row.status, OutboxStatus::Processed);
}

#[tokio::test]
async fn worker_recovers_after_transient_payment_failures() {
    let store = Arc::new(InMemoryStore::new());
    seed_reservation_with_events(&store, "AB12CD34").await;

    let payment = ScriptedGateway::with_script(vec![
        ScriptedOutcome::Error("connection reset"),
        ScriptedOutcome::Error("connection reset"),
    ]);
    let booking = ScriptedGateway::always_succeeding();
    let worker = processor(&store, Arc::new(payment.clone()), Arc::new(booking.clone()));

    let mut fully_drained = false;
    for _ in 0..5 {
        worker.process_pending_once(10).await.unwrap();
        if store
            .outbox_rows()
            .iter()
            .all(|r| r.status == OutboxStatus::Processed)
        {
            fully_drained = true;
            break;
        }
    }

    assert!(fully_drained, "both events must eventually drain");
    assert!(payment.calls() >= 3, "payment adapter retried across polls");
    assert_eq!(booking.calls(), 1, "healthy booking leg drained first time");
}

/// Payment gateway wrapped in a real circuit breaker, the same composition
/// the HTTP adapters use.
struct BreakerGuardedGateway {
    inner: ScriptedGateway,
    breaker: CircuitBreaker,
}

impl PaymentGateway for BreakerGuardedGateway {
    fn process_payment(
        &self,
        reservation: Reservation,
    ) -> PortFuture<'_, Result<DispatchResult, GatewayError>> {
        Box::pin(async move {
            match self
                .breaker
                .call(|| async {
                    match self.inner.process_payment(reservation).await {
                        Ok(result) if result.success => Ok(result),
                        Ok(result) => Err(GatewayError::Dispatch(result.status)),
                        Err(err) => Err(err),
                    }
                })
                .await
            {
                Ok(result) => Ok(result),
                Err(CircuitBreakerError::Open) => Ok(DispatchResult::failure("CIRCUIT_OPEN", None)),
                Err(CircuitBreakerError::Inner(err)) => {
                    Ok(DispatchResult::failure("FAILED", Some(serde_json::json!({
                        "error": err.to_string()
                    }))))
                }
            }
        })
    }
}

#[tokio::test]
async fn breaker_trips_mid_batch_and_all_events_stay_eligible() {
    let store = Arc::new(InMemoryStore::new());

    // Five payment-requested events across five reservations.
    for code in ["AAAA0001", "AAAA0002", "AAAA0003", "AAAA0004", "AAAA0005"] {
        let reservation = ReservationFixture::new(code).build();
        let mut tx = store.begin().await.unwrap();
        tx.save_reservation(reservation.clone()).await.unwrap();
        tx.commit().await.unwrap();
        let events = DomainEvent::for_reservation(&reservation);
        let payment_event = events
            .into_iter()
            .find(|e| e.event_type == reserva_domain::OutboxEventType::PaymentRequested)
            .unwrap();
        store.seed_outbox_event(payment_event);
    }

    let failing = ScriptedGateway::always_erroring("500 internal server error");
    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .failure_threshold(2)
            .recovery_timeout(Duration::from_secs(3600))
            .build(),
    );
    let guarded = BreakerGuardedGateway {
        inner: failing.clone(),
        breaker,
    };

    let worker = processor(
        &store,
        Arc::new(guarded),
        Arc::new(ScriptedGateway::always_succeeding()),
    );
    let processed = worker.process_pending_once(10).await.unwrap();
    assert_eq!(processed, 0);

    // Only the first two dispatches reached the underlying adapter; the
    // remaining three were short-circuited by the open breaker.
    assert_eq!(failing.calls(), 2);

    let rows = store.outbox_rows();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.status == OutboxStatus::Failed));
    let circuit_open_rows = rows
        .iter()
        .filter(|r| r.last_error.as_deref().unwrap().contains("CIRCUIT_OPEN"))
        .count();
    assert_eq!(circuit_open_rows, 3);
}

#[tokio::test]
async fn stop_signal_exits_the_loop_at_the_next_poll_boundary() {
    let store = Arc::new(InMemoryStore::new());
    let reconciler = Arc::new(UpdateReservationStatus::new(
        Arc::clone(&store) as Arc<dyn ReservationStore>
    ));
    let (worker, shutdown) = OutboxProcessor::new(
        Arc::clone(&store) as Arc<dyn OutboxStore>,
        Arc::new(ScriptedGateway::always_succeeding()),
        Arc::new(ScriptedGateway::always_succeeding()),
        reconciler,
        OutboxProcessorConfig {
            poll_interval: Duration::from_secs(3600),
            ..OutboxProcessorConfig::default()
        },
    );

    let handle = tokio::spawn(worker.run());
    shutdown.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker must stop promptly")
        .unwrap();
}
