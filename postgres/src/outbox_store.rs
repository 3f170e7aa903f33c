//! Worker-side outbox store over `PostgreSQL`.

use chrono::{DateTime, Utc};
use reserva_domain::{OutboxEvent, OutboxStatus, OutboxStore, PortFuture, StoreError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PostgreSQL`-backed [`OutboxStore`].
///
/// Every method is one short, row-local statement; the worker never holds a
/// transaction across provider I/O. Rows advance PENDING/FAILED → PROCESSED
/// through the row-local update, which the database linearizes.
#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(err: &sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn row_to_event(row: &PgRow) -> Result<OutboxEvent, StoreError> {
    let status_raw: String = row.try_get("status").map_err(|e| db_error(&e))?;
    let status = OutboxStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Database(format!("invalid outbox status: {status_raw}")))?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(|e| db_error(&e))?;
    Ok(OutboxEvent {
        id: row.try_get("id").map_err(|e| db_error(&e))?,
        aggregate_id: row.try_get("aggregate_id").map_err(|e| db_error(&e))?,
        event_type: row.try_get("event_type").map_err(|e| db_error(&e))?,
        payload: row.try_get("payload").map_err(|e| db_error(&e))?,
        status,
        created_at,
        last_error: row.try_get("last_error").map_err(|e| db_error(&e))?,
    })
}

impl OutboxStore for PgOutboxStore {
    fn claim_pending(&self, limit: usize) -> PortFuture<'_, Result<Vec<i64>, StoreError>> {
        Box::pin(async move {
            #[allow(clippy::cast_possible_wrap)]
            let limit = limit as i64;
            let rows: Vec<(i64,)> = sqlx::query_as(
                "SELECT id FROM provider_outbox_events
                 WHERE status IN ('PENDING', 'FAILED')
                 ORDER BY id ASC
                 LIMIT $1",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        })
    }

    fn load(&self, event_id: i64) -> PortFuture<'_, Result<Option<OutboxEvent>, StoreError>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, aggregate_id, event_type, payload, status, created_at, last_error
                 FROM provider_outbox_events
                 WHERE id = $1",
            )
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
            row.as_ref().map(row_to_event).transpose()
        })
    }

    fn mark_processed(&self, event_id: i64) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query(
                "UPDATE provider_outbox_events
                 SET status = 'PROCESSED', last_error = NULL
                 WHERE id = $1",
            )
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
            tracing::debug!(event_id, "outbox row marked PROCESSED");
            Ok(())
        })
    }

    fn mark_failed(
        &self,
        event_id: i64,
        last_error: String,
    ) -> PortFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query(
                "UPDATE provider_outbox_events
                 SET status = 'FAILED', last_error = $2
                 WHERE id = $1",
            )
            .bind(event_id)
            .bind(&last_error)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;
            tracing::debug!(event_id, error = %last_error, "outbox row marked FAILED");
            Ok(())
        })
    }
}
