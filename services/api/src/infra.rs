use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parkflow::config::AppConfig;
use parkflow::passes::InMemoryPassStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Residents registered at startup. The directory is otherwise immutable;
/// admin tooling for it sits outside this service.
const SEED_RESIDENTS: [(&str, &str, &str, &str); 5] = [
    ("Arun", "arun@parkflow.com", "password123", "A101"),
    ("Meera", "meera@parkflow.com", "password123", "A102"),
    ("Rahul", "rahul@parkflow.com", "password123", "B201"),
    ("Sneha", "sneha@parkflow.com", "password123", "B202"),
    ("Vikram", "vikram@parkflow.com", "password123", "C301"),
];

pub(crate) fn seed_store(config: &AppConfig) -> InMemoryPassStore {
    let store = InMemoryPassStore::new(config.parking.settings(), config.operator.account());
    for (name, email, password, flat_number) in SEED_RESIDENTS {
        if let Err(err) = store.add_resident(name, email, password, flat_number) {
            tracing::warn!(error = %err, resident = name, "failed to seed resident");
        }
    }
    store
}
