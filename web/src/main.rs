//! Reserva API server.
//!
//! Serves the reservation HTTP API and runs the outbox worker as an
//! in-process background task. Deployments that prefer a separate worker
//! replica run the `outbox-worker` binary instead and point both at the
//! same database.

use reserva_web::{bootstrap, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let bootstrap::Components {
        state,
        processor,
        shutdown,
    } = bootstrap::init(&settings).await?;

    let worker = tokio::spawn(processor.run());

    let app = reserva_web::router(state);
    let listener = tokio::net::TcpListener::bind(settings.bind_address()).await?;
    tracing::info!(address = %settings.bind_address(), "reserva API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the worker after the HTTP server has drained.
    shutdown.send(true).ok();
    worker.await?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received");
}
