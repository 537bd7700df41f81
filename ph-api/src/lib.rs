//! Proverb Hub API - the HTTP face of the server actions.
//!
//! An axum router wrapping the services in `ph-services`. Layers, outermost
//! first:
//! - request tracing
//! - security headers
//! - session gate (route classification and login redirects)
//! - generic API rate limit for `/api/` mutations

pub mod error;
pub mod extract;
pub mod middleware;
pub mod route_class;
pub mod routes;
pub mod session;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use ph_core::config::AppConfig;
use ph_core::error::{PhError, PhResult};
use ph_services::ServiceRegistry;

pub use error::{ApiError, ApiResult};
pub use route_class::{classify, RouteClass};
pub use state::AppState;

/// Assemble the router with all middleware.
pub fn build_router(state: AppState) -> Router {
    routes::api_routes()
        .layer(from_fn_with_state(state.clone(), middleware::api_rate_limit))
        .layer(from_fn_with_state(state.clone(), middleware::session_gate))
        .layer(from_fn_with_state(state.clone(), middleware::security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C or SIGTERM.
pub async fn serve(registry: Arc<ServiceRegistry>, config: AppConfig) -> PhResult<()> {
    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let app = build_router(AppState::new(registry, config));

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| PhError::Internal(format!("failed to bind {address}: {e}")))?;
    info!("listening on {address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
