//! Standalone outbox worker.
//!
//! Runs the same processing loop the API server embeds, as its own
//! replica. Safe to run alongside the API's in-process worker: row-status
//! transitions are row-local, and duplicate dispatches are covered by the
//! at-least-once contract with the providers.

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
        state: _state,
        processor,
        shutdown,
    } = bootstrap::init(&settings).await?;

    let worker = tokio::spawn(processor.run());
    tracing::info!("outbox worker running");

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received");
    shutdown.send(true).ok();
    worker.await?;
    Ok(())
}
