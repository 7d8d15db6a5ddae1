//! Process wiring for Ripple
//!
//! Assembles the settings provider, transition registry, runner, and feed
//! listener into one runnable service. Transition configuration is
//! validated before the listener takes a single event: a misconfigured
//! rule aborts startup.

#![deny(unsafe_code)]

use ripple_config::{ConfigResult, Settings, SettingsProvider};
use ripple_engine::{RunnerConfig, TransitionRunner};
use ripple_feed::{FeedListener, FeedResult, ListenerConfig};
use ripple_storage::{ChangeFeedSource, CheckpointStore, DocumentStore, RetryPolicy, RetryingStore};
use std::sync::Arc;
use tokio::sync::watch;

/// Service tuning, one sub-config per component.
#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    pub listener: ListenerConfig,
    pub runner: RunnerConfig,
    pub retry: RetryPolicy,
}

/// The assembled transition-processing service.
pub struct Service {
    provider: Arc<SettingsProvider>,
    listener: FeedListener,
}

impl Service {
    /// Wire the stock registry against the given store. Fails when any
    /// registered transition rejects the settings.
    pub fn build(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        feed: Arc<dyn ChangeFeedSource>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: ServiceConfig,
    ) -> ConfigResult<Self> {
        let registry = ripple_transitions::default_registry()?;
        let provider = Arc::new(SettingsProvider::new(settings));
        registry.init_all(&provider.current())?;

        // Transient I/O is absorbed at the repository boundary; the
        // engine only ever sees NotFound, Conflict, or a real outage
        let store: Arc<dyn DocumentStore> = Arc::new(RetryingStore::new(store, config.retry));
        let runner = Arc::new(TransitionRunner::new(
            registry,
            store,
            provider.clone(),
            config.runner,
        ));
        let listener = FeedListener::new(feed, checkpoints, runner, config.listener);

        Ok(Self { provider, listener })
    }

    /// Settings provider, for hot reloads while the service runs.
    pub fn settings(&self) -> Arc<SettingsProvider> {
        self.provider.clone()
    }

    /// Consume the feed until `shutdown` flips true, then drain and
    /// checkpoint.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> FeedResult<()> {
        self.listener.run(shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_storage::MemoryStore;
    use ripple_types::{DocId, Document};
    use serde_json::json;
    use tokio::time::{sleep, timeout, Duration};

    fn valid_settings() -> Settings {
        Settings::from_value(json!({
            "death_reporting": { "mark_deceased_forms": ["deceased"] }
        }))
        .unwrap()
    }

    fn build_with(settings: Settings) -> ConfigResult<(Service, Arc<MemoryStore>)> {
        let store = Arc::new(MemoryStore::new());
        let service = Service::build(
            settings,
            store.clone(),
            store.clone(),
            store.clone(),
            ServiceConfig::default(),
        )?;
        Ok((service, store))
    }

    #[test]
    fn test_misconfiguration_aborts_startup() {
        let result = build_with(Settings::from_value(json!({})).unwrap());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_death_report() {
        let (service, store) = build_with(valid_settings()).unwrap();
        store.seed(Document::new("p1").with_type("person")).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { service.run(shutdown_rx).await });

        let mut report = Document::new("r1")
            .with_type("data_record")
            .with_form("deceased")
            .with_field("patient_id", json!("p1"));
        report.from = Some("+15550000".to_string());
        report.reported_date = Some(1_700_000_000_000);
        store.save(&report).await.unwrap();

        timeout(Duration::from_secs(5), async {
            loop {
                let patient = store.get(&DocId::new("p1")).await.unwrap();
                if patient.date_of_death.is_some() {
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("patient was never marked deceased");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
