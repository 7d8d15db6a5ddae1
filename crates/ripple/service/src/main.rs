//! ripple-sentinel: run the transition engine against a document store.

use anyhow::Context;
use ripple_config::Settings;
use ripple_service::{Service, ServiceConfig};
use ripple_storage::MemoryStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings_path = std::env::args()
        .nth(1)
        .context("usage: ripple-sentinel <settings.json>")?;
    let settings = Settings::from_json_file(&settings_path)
        .with_context(|| format!("loading settings from {settings_path}"))?;

    // The in-memory adapter serves development; deployments inject the
    // real store behind the same traits.
    let store = Arc::new(MemoryStore::new());
    let service = Service::build(
        settings,
        store.clone(),
        store.clone(),
        store,
        ServiceConfig::default(),
    )
    .context("assembling service")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received, draining");
            let _ = shutdown_tx.send(true);
        }
    });

    service.run(shutdown_rx).await?;
    tracing::info!("ripple-sentinel stopped");
    Ok(())
}
