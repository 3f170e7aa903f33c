//! Axum HTTP front for the Reserva reservation service.
//!
//! The HTTP layer is a thin shell over the application use cases: handlers
//! parse and validate DTOs, invoke a use case, and map the outcome (or the
//! typed error) onto an HTTP response. Everything stateful lives in
//! [`AppState`]; everything failable surfaces as an [`AppError`] with a
//! status code and a machine-readable error code.
//!
//! # Surface
//!
//! - `POST /api/v1/reservations` → 201 with the created reservation
//! - `GET  /api/v1/reservations/{code}` → 200 snapshot or 404
//! - `GET  /api/v1/health` → 200 `{"status":"ok"}`

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod masking;
pub mod middleware;
pub mod state;

pub use config::Settings;
pub use error::AppError;
pub use middleware::{correlation_id_layer, CorrelationId, CORRELATION_ID_HEADER};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/reservations", post(handlers::reservations::create_reservation))
        .route(
            "/api/v1/reservations/:code",
            get(handlers::reservations::get_reservation),
        )
        .route("/api/v1/health", get(handlers::health::health_check))
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
