//! Create-reservation use case.

use crate::generate_code::{CodeGenerationError, GenerateReservationCode};
use crate::security::{
    enforce_pci_storage_rules, sanitize_and_validate_text, sanitize_payload, SecurityError,
};
use chrono::{DateTime, Utc};
use reserva_domain::{
    DomainError, DomainEvent, Reservation, ReservationStore, Snapshot, StoreError,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

/// Application input model for reservation creation.
///
/// The HTTP boundary has already checked shape (presence, types); this model
/// re-validates the business rules so the use case stays safe when invoked
/// from other fronts (worker tools, future CLIs).
#[derive(Debug, Clone)]
pub struct CreateReservationRequest {
    /// Supplier the booking leg is dispatched to.
    pub supplier_code: String,
    /// Pickup office code.
    pub pickup_office_code: String,
    /// Dropoff office code.
    pub dropoff_office_code: String,
    /// Start of the rental window.
    pub pickup_datetime: DateTime<Utc>,
    /// End of the rental window.
    pub dropoff_datetime: DateTime<Utc>,
    /// Total price.
    pub total_amount: Decimal,
    /// Customer snapshot.
    pub customer: Snapshot,
    /// Vehicle snapshot.
    pub vehicle: Snapshot,
}

const REQUIRED_CUSTOMER_KEYS: &[&str] = &["first_name", "last_name", "email"];
const REQUIRED_VEHICLE_KEYS: &[&str] = &["vehicle_code", "model", "category"];

impl CreateReservationRequest {
    fn validate(&self) -> Result<(), CreateReservationError> {
        if self.supplier_code.trim().is_empty() {
            return Err(CreateReservationError::Validation(
                "supplier_code must not be empty".to_string(),
            ));
        }
        if self.pickup_office_code.trim().is_empty() {
            return Err(CreateReservationError::Validation(
                "pickup_office_code must not be empty".to_string(),
            ));
        }
        if self.dropoff_office_code.trim().is_empty() {
            return Err(CreateReservationError::Validation(
                "dropoff_office_code must not be empty".to_string(),
            ));
        }
        if self.dropoff_datetime <= self.pickup_datetime {
            return Err(CreateReservationError::Validation(
                "dropoff_datetime must be after pickup_datetime".to_string(),
            ));
        }
        if self.total_amount <= Decimal::ZERO {
            return Err(CreateReservationError::Validation(
                "total_amount must be greater than zero".to_string(),
            ));
        }
        let missing_customer: Vec<_> = REQUIRED_CUSTOMER_KEYS
            .iter()
            .filter(|key| !self.customer.contains_key(**key))
            .collect();
        if !missing_customer.is_empty() {
            return Err(CreateReservationError::Validation(format!(
                "customer missing required keys: {missing_customer:?}"
            )));
        }
        let missing_vehicle: Vec<_> = REQUIRED_VEHICLE_KEYS
            .iter()
            .filter(|key| !self.vehicle.contains_key(**key))
            .collect();
        if !missing_vehicle.is_empty() {
            return Err(CreateReservationError::Validation(format!(
                "vehicle missing required keys: {missing_vehicle:?}"
            )));
        }
        Ok(())
    }
}

/// Errors from reservation creation.
#[derive(Error, Debug)]
pub enum CreateReservationError {
    /// Malformed or incomplete input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The sanitizer or PCI filter rejected the input.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// No unique code could be produced.
    #[error(transparent)]
    CodeGeneration(#[from] CodeGenerationError),

    /// A domain invariant failed while building the aggregate.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The atomic reservation + outbox write failed; nothing was persisted.
    #[error("unable to persist reservation and outbox events")]
    Persistence(#[source] StoreError),
}

/// Create a reservation and enqueue its external processing via the outbox.
///
/// The whole operation is atomic from the caller's perspective: the
/// reservation row and its two dispatch intents (`PAYMENT_REQUESTED`,
/// `BOOKING_REQUESTED`) are committed in one transaction, or not at all.
pub struct CreateReservation {
    generate_code: GenerateReservationCode,
    store: Arc<dyn ReservationStore>,
}

impl CreateReservation {
    /// Wire the use case.
    #[must_use]
    pub const fn new(generate_code: GenerateReservationCode, store: Arc<dyn ReservationStore>) -> Self {
        Self {
            generate_code,
            store,
        }
    }

    /// Execute the use case and return the persisted reservation.
    ///
    /// # Errors
    ///
    /// - [`CreateReservationError::Validation`] / `Security` for bad input
    /// - [`CreateReservationError::CodeGeneration`] when no unique code
    ///   could be produced
    /// - [`CreateReservationError::Persistence`] when the transaction fails;
    ///   in that case no reservation and no outbox rows are visible
    pub async fn execute(
        &self,
        request: CreateReservationRequest,
    ) -> Result<Reservation, CreateReservationError> {
        request.validate()?;

        let reservation_code = self.generate_code.execute().await?;

        let supplier_code = sanitize_and_validate_text(&request.supplier_code)?;
        let pickup_office_code = sanitize_and_validate_text(&request.pickup_office_code)?;
        let dropoff_office_code = sanitize_and_validate_text(&request.dropoff_office_code)?;
        let customer_snapshot = filter_snapshot(request.customer)?;
        let vehicle_snapshot = filter_snapshot(request.vehicle)?;

        let reservation = Reservation::new(
            reservation_code,
            supplier_code,
            pickup_office_code,
            dropoff_office_code,
            request.pickup_datetime,
            request.dropoff_datetime,
            request.total_amount,
            customer_snapshot,
            vehicle_snapshot,
        )?;

        let events = DomainEvent::for_reservation(&reservation);

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(CreateReservationError::Persistence)?;
        tx.save_reservation(reservation.clone())
            .await
            .map_err(CreateReservationError::Persistence)?;
        tx.append_outbox(events)
            .await
            .map_err(CreateReservationError::Persistence)?;
        tx.commit()
            .await
            .map_err(CreateReservationError::Persistence)?;

        tracing::info!(
            reservation_code = %reservation.reservation_code,
            supplier_code = %reservation.supplier_code,
            "reservation created with outbox intents"
        );
        metrics::counter!("reservations.created").increment(1);

        Ok(reservation)
    }
}

/// Sanitize every string leaf, then apply the PCI rules.
fn filter_snapshot(snapshot: Snapshot) -> Result<Snapshot, SecurityError> {
    let sanitized = sanitize_payload(serde_json::Value::Object(snapshot))?;
    let filtered = enforce_pci_storage_rules(sanitized)?;
    match filtered {
        serde_json::Value::Object(map) => Ok(map),
        // Both filters preserve the outer shape of an object payload.
        _ => Ok(Snapshot::new()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reserva_domain::{OutboxStatus, ReservationStatus};
    use reserva_testing::InMemoryStore;

    fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
            .collect()
    }

    fn valid_request() -> CreateReservationRequest {
        CreateReservationRequest {
            supplier_code: "SUP01".to_string(),
            pickup_office_code: "MAD01".to_string(),
            dropoff_office_code: "MAD02".to_string(),
            pickup_datetime: Utc.with_ymd_and_hms(2026, 12, 1, 10, 0, 0).unwrap(),
            dropoff_datetime: Utc.with_ymd_and_hms(2026, 12, 3, 10, 0, 0).unwrap(),
            total_amount: "180.50".parse().unwrap(),
            customer: snapshot(&[
                ("first_name", "Ana"),
                ("last_name", "Perez"),
                ("email", "ana@example.com"),
            ]),
            vehicle: snapshot(&[
                ("vehicle_code", "VH001"),
                ("model", "Corolla"),
                ("category", "Economy"),
            ]),
        }
    }

    fn use_case(store: &Arc<InMemoryStore>) -> CreateReservation {
        let store_dyn: Arc<dyn ReservationStore> = Arc::clone(store) as Arc<dyn ReservationStore>;
        CreateReservation::new(
            GenerateReservationCode::new(Arc::clone(&store_dyn)),
            store_dyn,
        )
    }

    #[tokio::test]
    async fn persists_reservation_with_exactly_two_pending_outbox_events() {
        let store = Arc::new(InMemoryStore::new());
        let created = use_case(&store).execute(valid_request()).await.unwrap();

        assert_eq!(created.status, ReservationStatus::Created);
        assert_eq!(store.reservation_count(), 1);

        let rows = store.outbox_rows();
        assert_eq!(rows.len(), 2);
        let types: Vec<_> = rows.iter().map(|r| r.event_type.as_str()).collect();
        assert!(types.contains(&"PAYMENT_REQUESTED"));
        assert!(types.contains(&"BOOKING_REQUESTED"));
        assert!(rows.iter().all(|r| r.status == OutboxStatus::Pending));
        assert!(rows
            .iter()
            .all(|r| r.aggregate_id == created.reservation_code.as_str()));
    }

    #[tokio::test]
    async fn outbox_payload_carries_the_reservation_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let created = use_case(&store).execute(valid_request()).await.unwrap();

        let rows = store.outbox_rows();
        let snapshot = &rows[0].payload["reservation"];
        assert_eq!(snapshot["reservation_code"], created.reservation_code.as_str());
        assert_eq!(snapshot["supplier_code"], "SUP01");
        assert_eq!(snapshot["total_amount"], "180.50");
    }

    #[tokio::test]
    async fn rejects_inverted_window() {
        let store = Arc::new(InMemoryStore::new());
        let mut request = valid_request();
        std::mem::swap(&mut request.pickup_datetime, &mut request.dropoff_datetime);

        let err = use_case(&store).execute(request).await.unwrap_err();
        assert!(matches!(err, CreateReservationError::Validation(_)));
        assert_eq!(store.reservation_count(), 0);
    }

    #[tokio::test]
    async fn rejects_missing_customer_keys() {
        let store = Arc::new(InMemoryStore::new());
        let mut request = valid_request();
        request.customer.remove("email");

        let err = use_case(&store).execute(request).await.unwrap_err();
        match err {
            CreateReservationError::Validation(msg) => assert!(msg.contains("email")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn rejects_sql_shaped_supplier_code() {
        let store = Arc::new(InMemoryStore::new());
        let mut request = valid_request();
        request.supplier_code = "SUP01; DROP TABLE reservations".to_string();

        let err = use_case(&store).execute(request).await.unwrap_err();
        assert!(matches!(
            err,
            CreateReservationError::Security(SecurityError::SqlInjection)
        ));
    }

    #[tokio::test]
    async fn drops_cvv_and_rejects_raw_pan_in_customer_snapshot() {
        let store = Arc::new(InMemoryStore::new());

        let mut with_cvv = valid_request();
        with_cvv
            .customer
            .insert("cvv".to_string(), serde_json::Value::from("123"));
        let created = use_case(&store).execute(with_cvv).await.unwrap();
        assert!(created.customer_snapshot.get("cvv").is_none());

        let mut with_pan = valid_request();
        with_pan
            .customer
            .insert("card_number".to_string(), serde_json::Value::from("4111111111111111"));
        let err = use_case(&store).execute(with_pan).await.unwrap_err();
        assert!(matches!(
            err,
            CreateReservationError::Security(SecurityError::RawCardNumber)
        ));
    }

    #[tokio::test]
    async fn outbox_failure_rolls_back_the_reservation_insert() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_next_outbox_append();

        let err = use_case(&store).execute(valid_request()).await.unwrap_err();
        assert!(matches!(err, CreateReservationError::Persistence(_)));

        // All-or-nothing: the reservation insert must not be visible.
        assert_eq!(store.reservation_count(), 0);
        assert!(store.outbox_rows().is_empty());
    }

    #[tokio::test]
    async fn concurrent_creates_produce_distinct_codes() {
        let store = Arc::new(InMemoryStore::new());
        let use_case = Arc::new(use_case(&store));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let use_case = Arc::clone(&use_case);
            handles.push(tokio::spawn(async move {
                use_case.execute(valid_request()).await
            }));
        }

        let mut codes = std::collections::HashSet::new();
        for handle in handles {
            let created = handle.await.unwrap().unwrap();
            let code = created.reservation_code.to_string();
            assert_eq!(code.len(), 8);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(codes.insert(code), "codes must be distinct");
        }
        assert_eq!(store.reservation_count(), 100);
        assert_eq!(store.outbox_rows().len(), 200);
    }

    #[tokio::test]
    async fn contended_generator_retries_until_codes_are_unique() {
        use crate::generate_code::CodeSource;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let store = Arc::new(InMemoryStore::new());
        let store_dyn: Arc<dyn ReservationStore> = Arc::clone(&store) as Arc<dyn ReservationStore>;

        // Every task's first candidate is the same code; later candidates are
        // unique, so collisions must be resolved through the retry loop.
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source: CodeSource = Arc::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                "SAMECODE".to_string()
            } else {
                format!("UNIQ{n:04}")
            }
        });

        let use_case = Arc::new(CreateReservation::new(
            GenerateReservationCode::new(Arc::clone(&store_dyn)).with_code_source(source),
            store_dyn,
        ));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let use_case = Arc::clone(&use_case);
            handles.push(tokio::spawn(async move {
                use_case.execute(valid_request()).await
            }));
        }

        let mut codes = std::collections::HashSet::new();
        for handle in handles {
            let created = handle.await.unwrap().unwrap();
            assert!(codes.insert(created.reservation_code.to_string()));
        }
        assert_eq!(codes.len(), 50);
        // The shared first candidate forces at least one retry overall.
        assert!(calls.load(Ordering::SeqCst) > 50);
    }
}
