//! Reservation store over `PostgreSQL`.

use chrono::{DateTime, Utc};
use reserva_domain::{
    DomainEvent, PortFuture, ProviderRequest, ProviderRequestType, Reservation, ReservationCode,
    ReservationStatus, ReservationStore, StatusChange, StoreError, StoreTx,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

/// `PostgreSQL`-backed [`ReservationStore`].
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for callers that need ad-hoc queries.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(err: &sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn row_to_reservation(row: &PgRow) -> Result<Reservation, StoreError> {
    let code: String = row.try_get("reservation_code").map_err(|e| db_error(&e))?;
    let status_raw: String = row.try_get("status").map_err(|e| db_error(&e))?;
    let status = ReservationStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Database(format!("invalid reservation status: {status_raw}")))?;
    let customer: serde_json::Value = row.try_get("customer_snapshot").map_err(|e| db_error(&e))?;
    let vehicle: serde_json::Value = row.try_get("vehicle_snapshot").map_err(|e| db_error(&e))?;

    Ok(Reservation {
        reservation_code: ReservationCode::new(code).map_err(|e| StoreError::Database(e.to_string()))?,
        supplier_code: row.try_get("supplier_code").map_err(|e| db_error(&e))?,
        pickup_office_code: row.try_get("pickup_office_code").map_err(|e| db_error(&e))?,
        dropoff_office_code: row.try_get("dropoff_office_code").map_err(|e| db_error(&e))?,
        pickup_datetime: row.try_get("pickup_datetime").map_err(|e| db_error(&e))?,
        dropoff_datetime: row.try_get("dropoff_datetime").map_err(|e| db_error(&e))?,
        total_amount: row.try_get("total_amount").map_err(|e| db_error(&e))?,
        customer_snapshot: value_to_map(customer),
        vehicle_snapshot: value_to_map(vehicle),
        status,
        created_at: row.try_get("created_at").map_err(|e| db_error(&e))?,
        status_history: Vec::new(),
    })
}

fn value_to_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn row_to_status_change(row: &PgRow) -> Result<StatusChange, StoreError> {
    let from_raw: String = row.try_get("from_status").map_err(|e| db_error(&e))?;
    let to_raw: String = row.try_get("to_status").map_err(|e| db_error(&e))?;
    let changed_at: DateTime<Utc> = row.try_get("changed_at").map_err(|e| db_error(&e))?;
    let from_status = ReservationStatus::parse(&from_raw)
        .ok_or_else(|| StoreError::Database(format!("invalid status in history: {from_raw}")))?;
    let to_status = ReservationStatus::parse(&to_raw)
        .ok_or_else(|| StoreError::Database(format!("invalid status in history: {to_raw}")))?;
    Ok(StatusChange {
        from_status,
        to_status,
        changed_at,
    })
}

const RESERVATION_COLUMNS: &str = "reservation_code, status, supplier_code, pickup_office_code, \
     dropoff_office_code, pickup_datetime, dropoff_datetime, total_amount, \
     customer_snapshot, vehicle_snapshot, created_at";

impl ReservationStore for PgReservationStore {
    fn begin(&self) -> PortFuture<'_, Result<Box<dyn StoreTx>, StoreError>> {
        Box::pin(async move {
            let tx = self.pool.begin().await.map_err(|e| db_error(&e))?;
            Ok(Box::new(PgStoreTx { tx }) as Box<dyn StoreTx>)
        })
    }

    fn find_by_code(
        &self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<Option<Reservation>, StoreError>> {
        Box::pin(async move {
            let query =
                format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE reservation_code = $1");
            let row = sqlx::query(&query)
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error(&e))?;

            let Some(row) = row else {
                return Ok(None);
            };
            let mut reservation = row_to_reservation(&row)?;

            let history_rows = sqlx::query(
                "SELECT from_status, to_status, changed_at
                 FROM reservation_status_history
                 WHERE reservation_code = $1
                 ORDER BY id ASC",
            )
            .bind(code.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;

            reservation.status_history = history_rows
                .iter()
                .map(row_to_status_change)
                .collect::<Result<_, _>>()?;

            Ok(Some(reservation))
        })
    }

    fn exists_code(&self, code: ReservationCode) -> PortFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move {
            let (exists,): (bool,) = sqlx::query_as(
                "SELECT EXISTS(SELECT 1 FROM reservations WHERE reservation_code = $1)",
            )
            .bind(code.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
            Ok(exists)
        })
    }

    fn count_successful_requests(
        &self,
        code: ReservationCode,
        request_type: ProviderRequestType,
    ) -> PortFuture<'_, Result<i64, StoreError>> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM reservation_provider_requests
                 WHERE reservation_code = $1 AND request_type = $2 AND status = 'SUCCESS'",
            )
            .bind(code.as_str())
            .bind(request_type.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
            Ok(count)
        })
    }

    fn status_history(
        &self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<Vec<StatusChange>, StoreError>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT from_status, to_status, changed_at
                 FROM reservation_status_history
                 WHERE reservation_code = $1
                 ORDER BY id ASC",
            )
            .bind(code.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
            rows.iter().map(row_to_status_change).collect()
        })
    }
}

/// One open store transaction over a dedicated connection.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

impl StoreTx for PgStoreTx {
    fn save_reservation(
        &mut self,
        reservation: Reservation,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM reservations WHERE reservation_code = $1")
                    .bind(reservation.reservation_code.as_str())
                    .fetch_optional(&mut *self.tx)
                    .await
                    .map_err(|e| db_error(&e))?;

            if exists.is_some() {
                sqlx::query(
                    "UPDATE reservations
                     SET status = $2, supplier_code = $3, pickup_office_code = $4,
                         dropoff_office_code = $5, pickup_datetime = $6, dropoff_datetime = $7,
                         total_amount = $8, customer_snapshot = $9, vehicle_snapshot = $10
                     WHERE reservation_code = $1",
                )
                .bind(reservation.reservation_code.as_str())
                .bind(reservation.status.as_str())
                .bind(&reservation.supplier_code)
                .bind(&reservation.pickup_office_code)
                .bind(&reservation.dropoff_office_code)
                .bind(reservation.pickup_datetime)
                .bind(reservation.dropoff_datetime)
                .bind(reservation.total_amount)
                .bind(serde_json::Value::Object(reservation.customer_snapshot.clone()))
                .bind(serde_json::Value::Object(reservation.vehicle_snapshot.clone()))
                .execute(&mut *self.tx)
                .await
                .map_err(|e| db_error(&e))?;
                return Ok(());
            }

            sqlx::query(
                "INSERT INTO reservations (reservation_code, status, supplier_code,
                     pickup_office_code, dropoff_office_code, pickup_datetime,
                     dropoff_datetime, total_amount, customer_snapshot, vehicle_snapshot,
                     created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(reservation.reservation_code.as_str())
            .bind(reservation.status.as_str())
            .bind(&reservation.supplier_code)
            .bind(&reservation.pickup_office_code)
            .bind(&reservation.dropoff_office_code)
            .bind(reservation.pickup_datetime)
            .bind(reservation.dropoff_datetime)
            .bind(reservation.total_amount)
            .bind(serde_json::Value::Object(reservation.customer_snapshot.clone()))
            .bind(serde_json::Value::Object(reservation.vehicle_snapshot.clone()))
            .bind(reservation.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateCode(reservation.reservation_code.clone())
                } else {
                    db_error(&e)
                }
            })?;
            Ok(())
        })
    }

    fn append_outbox(&mut self, events: Vec<DomainEvent>) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            for event in events {
                sqlx::query(
                    "INSERT INTO provider_outbox_events (aggregate_id, event_type, payload, status)
                     VALUES ($1, $2, $3, 'PENDING')",
                )
                .bind(&event.aggregate_id)
                .bind(event.event_type.as_str())
                .bind(&event.payload)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| db_error(&e))?;
            }
            Ok(())
        })
    }

    fn reservation_status(
        &mut self,
        code: ReservationCode,
    ) -> PortFuture<'_, Result<ReservationStatus, StoreError>> {
        Box::pin(async move {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT status FROM reservations WHERE reservation_code = $1")
                    .bind(code.as_str())
                    .fetch_optional(&mut *self.tx)
                    .await
                    .map_err(|e| db_error(&e))?;

            let Some((raw,)) = row else {
                return Err(StoreError::NotFound(code));
            };
            ReservationStatus::parse(&raw)
                .ok_or_else(|| StoreError::Database(format!("invalid reservation status: {raw}")))
        })
    }

    fn insert_provider_request(
        &mut self,
        request: ProviderRequest,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO reservation_provider_requests (reservation_code, provider_code,
                     request_type, request_payload, response_payload, status, responded_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(request.reservation_code.as_str())
            .bind(&request.provider_code)
            .bind(request.request_type.as_str())
            .bind(&request.request_payload)
            .bind(&request.response_payload)
            .bind(request.status.as_str())
            .bind(request.responded_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error(&e))?;
            Ok(())
        })
    }

    fn count_successful_requests(
        &mut self,
        code: ReservationCode,
        request_type: ProviderRequestType,
    ) -> PortFuture<'_, Result<i64, StoreError>> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM reservation_provider_requests
                 WHERE reservation_code = $1 AND request_type = $2 AND status = 'SUCCESS'",
            )
            .bind(code.as_str())
            .bind(request_type.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| db_error(&e))?;
            Ok(count)
        })
    }

    fn update_status(
        &mut self,
        code: ReservationCode,
        status: ReservationStatus,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE reservations SET status = $2 WHERE reservation_code = $1",
            )
            .bind(code.as_str())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error(&e))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(code));
            }
            Ok(())
        })
    }

    fn append_status_history(
        &mut self,
        code: ReservationCode,
        change: StatusChange,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO reservation_status_history (reservation_code, from_status,
                     to_status, changed_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(code.as_str())
            .bind(change.from_status.as_str())
            .bind(change.to_status.as_str())
            .bind(change.changed_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error(&e))?;
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> PortFuture<'static, Result<(), StoreError>> {
        Box::pin(async move { self.tx.commit().await.map_err(|e| db_error(&e)) })
    }
}
