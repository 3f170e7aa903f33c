//! `PostgreSQL` implementations of the Reserva store ports.
//!
//! This crate provides the production stores behind the capability ports in
//! `reserva-domain`:
//!
//! - [`PgReservationStore`] — reservations, provider requests and status
//!   history, with explicit transactions for the atomic write paths
//! - [`PgOutboxStore`] — the worker-side view of the outbox table
//!
//! Uniqueness of reservation codes is enforced by a unique index and
//! surfaced as [`reserva_domain::StoreError::DuplicateCode`]. The
//! all-or-nothing guarantee of reservation creation is the `sqlx`
//! transaction drop path: a transaction that is never committed rolls every
//! buffered write back.
//!
//! # Example
//!
//! ```ignore
//! let pool = reserva_postgres::connect("postgres://localhost/reserva", 10).await?;
//! reserva_postgres::migrate(&pool).await?;
//! let store = PgReservationStore::new(pool.clone());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod outbox_store;
pub mod reservation_store;

pub use outbox_store::PgOutboxStore;
pub use reservation_store::PgReservationStore;

use reserva_domain::StoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Open a bounded connection pool.
///
/// # Errors
///
/// Returns [`StoreError::Database`] when the server is unreachable.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| StoreError::Database(format!("failed to connect: {e}")))
}

/// Apply the schema migrations bundled with this crate.
///
/// # Errors
///
/// Returns [`StoreError::Database`] when a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("migration failed: {e}")))
}
