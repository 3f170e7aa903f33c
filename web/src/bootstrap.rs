//! Shared wiring for the service binaries.
//!
//! Both the API server and the standalone worker build the same object
//! graph: pool → stores → resilience envelopes → gateways → use cases.
//! Keeping it in one place means the two deployment shapes (worker task
//! inside the API process, or a separate worker replica) cannot drift.

use crate::config::Settings;
use crate::state::AppState;
use reserva_app::{CreateReservation, GenerateReservationCode, UpdateReservationStatus};
use reserva_domain::{OutboxStore, ReservationStore};
use reserva_outbox::{OutboxProcessor, OutboxProcessorConfig};
use reserva_postgres::{PgOutboxStore, PgReservationStore};
use reserva_providers::{HttpBookingGateway, HttpPaymentGateway, ProviderEndpoint};
use reserva_runtime::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use std::sync::Arc;
use tokio::sync::watch;

/// Fully wired service components.
pub struct Components {
    /// Handler state for the HTTP router.
    pub state: AppState,
    /// The outbox worker, ready to `run()`.
    pub processor: OutboxProcessor,
    /// Stop signal for the worker.
    pub shutdown: watch::Sender<bool>,
}

/// Connect, migrate, and wire every component from settings.
///
/// # Errors
///
/// Fails when the database is unreachable, migrations cannot be applied,
/// or the HTTP client cannot be constructed.
pub async fn init(settings: &Settings) -> anyhow::Result<Components> {
    let pool = reserva_postgres::connect(&settings.database_url, settings.db_max_connections).await?;
    reserva_postgres::migrate(&pool).await?;

    let store: Arc<dyn ReservationStore> = Arc::new(PgReservationStore::new(pool.clone()));
    let outbox: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(pool));

    let client = reqwest::Client::builder().build()?;
    let retry = RetryPolicy::builder()
        .max_retries(settings.retry_max_retries)
        .base_delay(settings.retry_base_delay)
        .backoff_factor(settings.retry_backoff_factor)
        .max_delay(settings.retry_max_delay)
        .build();
    let breaker_config = CircuitBreakerConfig::builder()
        .failure_threshold(settings.breaker_failure_threshold)
        .recovery_timeout(settings.breaker_recovery)
        .build();

    // One breaker per dependency: a tripping payment provider must not
    // black out the booking leg.
    let payment_endpoint = ProviderEndpoint::new(
        client.clone(),
        format!("{}/payments", settings.payment_api_base_url),
        CircuitBreaker::new(breaker_config.clone()),
        retry.clone(),
    )
    .with_timeout(settings.provider_timeout);
    let booking_endpoint = ProviderEndpoint::new(
        client,
        format!("{}/bookings", settings.provider_api_base_url),
        CircuitBreaker::new(breaker_config),
        retry,
    )
    .with_timeout(settings.provider_timeout);

    let generate_code = GenerateReservationCode::new(Arc::clone(&store))
        .with_max_retries(settings.code_max_retries);
    let create_reservation = Arc::new(CreateReservation::new(generate_code, Arc::clone(&store)));
    let reconciler = Arc::new(UpdateReservationStatus::new(Arc::clone(&store)));

    let (processor, shutdown) = OutboxProcessor::new(
        outbox,
        Arc::new(HttpPaymentGateway::new(payment_endpoint)),
        Arc::new(HttpBookingGateway::new(booking_endpoint)),
        reconciler,
        OutboxProcessorConfig {
            batch_size: settings.outbox_batch_size,
            poll_interval: settings.outbox_poll_interval,
            ..OutboxProcessorConfig::default()
        },
    );

    Ok(Components {
        state: AppState::new(create_reservation, store),
        processor,
        shutdown,
    })
}
