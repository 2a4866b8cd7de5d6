use std::sync::Arc;

use shared_config::AppConfig;

use crate::memory::InMemoryStore;
use crate::store::ClinicStore;

/// Shared handler state: configuration plus the store every cell talks to.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ClinicStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn ClinicStore>) -> Self {
        Self { config, store }
    }

    pub fn in_memory(config: Arc<AppConfig>) -> (Self, Arc<InMemoryStore>) {
        let memory = Arc::new(InMemoryStore::new());
        let store: Arc<dyn ClinicStore> = memory.clone();
        (Self { config, store }, memory)
    }
}
