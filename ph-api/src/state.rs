use std::sync::Arc;

use ph_core::config::AppConfig;
use ph_services::ServiceRegistry;

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(registry: Arc<ServiceRegistry>, config: AppConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }
}
