//! Serve command - run the HTTP server until interrupted.

use tracing::{info, warn};

use ph_core::config::ConfigHandle;
use ph_core::error::PhResult;

pub async fn run(config: ConfigHandle, port: Option<u16>, bind: Option<String>) -> PhResult<()> {
    {
        let mut cfg = config.write().await;
        if let Some(port) = port {
            cfg.server.port = port;
        }
        if let Some(bind) = bind {
            cfg.server.bind_address = bind;
        }
    }

    let registry = super::init_registry(&config).await?;
    let cfg = config.snapshot().await;
    if !cfg.uses_redis() {
        warn!("running with the in-process store; cache and limits are not shared between instances");
    }
    info!(
        "starting Proverb Hub on {} ({} services)",
        cfg.listen_address(),
        registry.service_count()
    );

    let result = ph_api::serve(registry.clone(), cfg).await;
    registry.shutdown_all();
    result
}
