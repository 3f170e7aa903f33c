//! In-memory implementation of the store ports.

use chrono::Utc;
use reserva_domain::{
    DomainEvent, OutboxEvent, OutboxStatus, PortFuture, ProviderRequest, ProviderRequestStatus,
    ProviderRequestType, Reservation, ReservationCode, ReservationStatus, ReservationStore,
    StatusChange, StoreError, StoreTx,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemState {
    reservations: BTreeMap<String, Reservation>,
    outbox: BTreeMap<i64, OutboxEvent>,
    provider_requests: Vec<ProviderRequest>,
    history: Vec<(String, StatusChange)>,
    next_outbox_id: i64,
}

/// In-memory store implementing both [`ReservationStore`] and
/// [`reserva_domain::OutboxStore`].
///
/// Transactions buffer their writes and apply them atomically at commit;
/// dropping an uncommitted transaction discards everything, mirroring the
/// rollback semantics of the PostgreSQL implementation. Uniqueness of
/// reservation codes is enforced at commit time.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemState>>,
    fail_next_outbox_append: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `append_outbox` call fail as if a constraint were
    /// violated. Used to exercise the atomic-rollback guarantee.
    pub fn fail_next_outbox_append(&self) {
        self.fail_next_outbox_append.store(true, Ordering::SeqCst);
    }

    /// All outbox rows, ascending by id.
    #[must_use]
    pub fn outbox_rows(&self) -> Vec<OutboxEvent> {
        self.lock().outbox.values().cloned().collect()
    }

    /// All provider-request rows for a reservation.
    #[must_use]
    pub fn provider_requests(&self, code: &ReservationCode) -> Vec<ProviderRequest> {
        self.lock()
            .provider_requests
            .iter()
            .filter(|r| &r.reservation_code == code)
            .cloned()
            .collect()
    }

    /// Number of reservations currently committed.
    #[must_use]
    pub fn reservation_count(&self) -> usize {
        self.lock().reservations.len()
    }

    /// Seed one outbox row directly (bypassing a transaction), returning its id.
    pub fn seed_outbox_event(&self, event: DomainEvent) -> i64 {
        let mut state = self.lock();
        state.next_outbox_id += 1;
        let id = state.next_outbox_id;
        state.outbox.insert(
            id,
            OutboxEvent {
                id,
                aggregate_id: event.aggregate_id,
                event_type: event.event_type.as_str().to_string(),
                payload: event.payload,
                status: OutboxStatus::Pending,
                created_at: Utc::now(),
                last_error: None,
            },
        );
        id
    }

    /// Seed one outbox row with a raw (possibly unknown) event type.
    pub fn seed_raw_outbox_event(&self, aggregate_id: &str, event_type: &str) -> i64 {
        let mut state = self.lock();
        state.next_outbox_id += 1;
        let id = state.next_outbox_id;
        state.outbox.insert(
            id,
            OutboxEvent {
                id,
                aggregate_id: aggregate_id.to_string(),
                event_type: event_type.to_string(),
                payload: serde_json::json!({}),
                status: OutboxStatus::Pending,
                created_at: Utc::now(),
                last_error: None,
            },
        );
        id
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> MutexGuard<'_, MemState> {
        // Lock poisoning only happens when a test already panicked.
        self.state.lock().unwrap()
    }
}

enum StagedWrite {
    SaveReservation(Reservation),
    AppendOutbox(Vec<DomainEvent>),
    InsertProviderRequest(ProviderRequest),
    UpdateStatus(ReservationCode, ReservationStatus),
    AppendHistory(ReservationCode, StatusChange),
}

/// Buffered in-memory transaction.
pub struct InMemoryTx {
    store: InMemoryStore,
    staged: Vec<StagedWrite>,
}

impl InMemoryTx {
    fn staged_status(&self, code: &ReservationCode) -> Option<ReservationStatus> {
        self.staged.iter().rev().find_map(|w| match w {
            StagedWrite::UpdateStatus(c, status) if c == code => Some(*status),
            StagedWrite::SaveReservation(r) if &r.reservation_code == code => Some(r.status),
            _ => None,
        })
    }

    fn staged_success_count(&self, code: &ReservationCode, ty: ProviderRequestType) -> i64 {
        self.staged
            .iter()
            .filter(|w| {
                matches!(w, StagedWrite::InsertProviderRequest(r)
                    if &r.reservation_code == code
                        && r.request_type == ty
                        && r.status == ProviderRequestStatus::Success)
            })
            .count() as i64
    }
}

impl StoreTx for InMemoryTx {
    fn save_reservation(
        &mut self,
        reservation: Reservation,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.staged.push(StagedWrite::SaveReservation(reservation));
            Ok(())
        })
    }

    fn append_outbox(&mut self, events: Vec<DomainEvent>) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            if self
                .store
                .fail_next_outbox_append
                .swap(false, Ordering::SeqCst)
            {
                return Err(StoreError::Database(
                    "synthetic outbox constraint violation".to_string(),
                ));
            }
            self.staged.push(StagedWrite::AppendOutbox(events));
            Ok(())
        })
    }

    fn reservation_status(
        &mut self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<ReservationStatus, StoreError>> {
        Box::pin(async move {
            if let Some(status) = self.staged_status(&code) {
                return Ok(status);
            }
            let state = self.store.lock();
            state
                .reservations
                .get(code.as_str())
                .map(|r| r.status)
                .ok_or(StoreError::NotFound(code))
        })
    }

    fn insert_provider_request(
        &mut self,
        request: ProviderRequest,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.staged.push(StagedWrite::InsertProviderRequest(request));
            Ok(())
        })
    }

    fn count_successful_requests(
        &mut self,
        code: ReservationCode,
        request_type: ProviderRequestType,
    ) -> PortFuture<'_, Result<i64, StoreError>> {
        Box::pin(async move {
            let committed = {
                let state = self.store.lock();
                state
                    .provider_requests
                    .iter()
                    .filter(|r| {
                        r.reservation_code == code
                            && r.request_type == request_type
                            && r.status == ProviderRequestStatus::Success
                    })
                    .count() as i64
            };
            Ok(committed + self.staged_success_count(&code, request_type))
        })
    }

    fn update_status(
        &mut self,
        code: ReservationCode,
        status: ReservationStatus,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            {
                let state = self.store.lock();
                if !state.reservations.contains_key(code.as_str())
                    && self.staged_status(&code).is_none()
                {
                    return Err(StoreError::NotFound(code));
                }
            }
            self.staged.push(StagedWrite::UpdateStatus(code, status));
            Ok(())
        })
    }

    fn append_status_history(
        &mut self,
        code: ReservationCode,
        change: StatusChange,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.staged.push(StagedWrite::AppendHistory(code, change));
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> PortFuture<'static, Result<(), StoreError>> {
        Box::pin(async move {
            let mut state = self.store.lock();

            // Uniqueness is checked before any write is applied, so a
            // conflicting transaction leaves no partial state behind.
            for write in &self.staged {
                if let StagedWrite::SaveReservation(r) = write {
                    let exists = state.reservations.contains_key(r.reservation_code.as_str());
                    if exists {
                        return Err(StoreError::DuplicateCode(r.reservation_code.clone()));
                    }
                }
            }

            for write in self.staged {
                match write {
                    StagedWrite::SaveReservation(r) => {
                        state.reservations.insert(r.reservation_code.to_string(), r);
                    }
                    StagedWrite::AppendOutbox(events) => {
                        for event in events {
                            state.next_outbox_id += 1;
                            let id = state.next_outbox_id;
                            state.outbox.insert(
                                id,
                                OutboxEvent {
                                    id,
                                    aggregate_id: event.aggregate_id,
                                    event_type: event.event_type.as_str().to_string(),
                                    payload: event.payload,
                                    status: OutboxStatus::Pending,
                                    created_at: Utc::now(),
                                    last_error: None,
                                },
                            );
                        }
                    }
                    StagedWrite::InsertProviderRequest(request) => {
                        state.provider_requests.push(request);
                    }
                    StagedWrite::UpdateStatus(code, status) => {
                        if let Some(r) = state.reservations.get_mut(code.as_str()) {
                            r.status = status;
                        }
                    }
                    StagedWrite::AppendHistory(code, change) => {
                        state.history.push((code.to_string(), change));
                    }
                }
            }
            Ok(())
        })
    }
}

impl ReservationStore for InMemoryStore {
    fn begin(&self) -> PortFuture<'_, Result<Box<dyn StoreTx>, StoreError>> {
        Box::pin(async move {
            Ok(Box::new(InMemoryTx {
                store: self.clone(),
                staged: Vec::new(),
            }) as Box<dyn StoreTx>)
        })
    }

    fn find_by_code(
        &self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<Option<Reservation>, StoreError>> {
        Box::pin(async move { Ok(self.lock().reservations.get(code.as_str()).cloned()) })
    }

    fn exists_code(&self, code: ReservationCode) -> PortFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move { Ok(self.lock().reservations.contains_key(code.as_str())) })
    }

    fn count_successful_requests(
        &self,
        code: ReservationCode,
        request_type: ProviderRequestType,
    ) -> PortFuture<'_, Result<i64, StoreError>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .provider_requests
                .iter()
                .filter(|r| {
                    r.reservation_code == code
                        && r.request_type == request_type
                        && r.status == ProviderRequestStatus::Success
                })
                .count() as i64)
        })
    }

    fn status_history(
        &self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<Vec<StatusChange>, StoreError>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .history
                .iter()
                .filter(|(c, _)| c == code.as_str())
                .map(|(_, change)| change.clone())
                .collect())
        })
    }
}

impl reserva_domain::OutboxStore for InMemoryStore {
    fn claim_pending(&self, limit: usize) -> PortFuture<'_, Result<Vec<i64>, StoreError>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .outbox
                .values()
                .filter(|e| matches!(e.status, OutboxStatus::Pending | OutboxStatus::Failed))
                .map(|e| e.id)
                .take(limit)
                .collect())
        })
    }

    fn load(&self, event_id: i64) -> PortFuture<'_, Result<Option<OutboxEvent>, StoreError>> {
        Box::pin(async move { Ok(self.lock().outbox.get(&event_id).cloned()) })
    }

    fn mark_processed(&self, event_id: i64) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            if let Some(event) = self.lock().outbox.get_mut(&event_id) {
                event.status = OutboxStatus::Processed;
                event.last_error = None;
            }
            Ok(())
        })
    }

    fn mark_failed(
        &self,
        event_id: i64,
        last_error: String,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            if let Some(event) = self.lock().outbox.get_mut(&event_id) {
                event.status = OutboxStatus::Failed;
                event.last_error = Some(last_error);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::ReservationFixture;
    use reserva_domain::OutboxStore;

    #[tokio::test]
    async fn committed_reservation_is_visible() {
        let store = InMemoryStore::new();
        let reservation = ReservationFixture::new("AB12CD34").build();

        let mut tx = store.begin().await.unwrap();
        tx.save_reservation(reservation.clone()).await.unwrap();
        tx.commit().await.unwrap();

        let found = store
            .find_by_code(reservation.reservation_code.clone())
            .await
            .unwrap();
        assert_eq!(found, Some(reservation));
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();
        let reservation = ReservationFixture::new("AB12CD34").build();

        {
            let mut tx = store.begin().await.unwrap();
            tx.save_reservation(reservation.clone()).await.unwrap();
            // dropped without commit
        }

        assert_eq!(store.reservation_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_code_rejected_at_commit() {
        let store = InMemoryStore::new();
        let reservation = ReservationFixture::new("AB12CD34").build();

        let mut tx = store.begin().await.unwrap();
        tx.save_reservation(reservation.clone()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.save_reservation(reservation).await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCode(_)));
    }

    #[tokio::test]
    async fn claim_pending_returns_ascending_ids_for_pending_and_failed() {
        let store = InMemoryStore::new();
        let reservation = ReservationFixture::new("AB12CD34").build();
        let events = DomainEvent::for_reservation(&reservation);
        let first = store.seed_outbox_event(events[0].clone());
        let second = store.seed_outbox_event(events[1].clone());

        store.mark_failed(first, "boom".to_string()).await.unwrap();
        assert_eq!(store.claim_pending(10).await.unwrap(), vec![first, second]);

        store.mark_processed(second).await.unwrap();
        assert_eq!(store.claim_pending(10).await.unwrap(), vec![first]);
    }
}
