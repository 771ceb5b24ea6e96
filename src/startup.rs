//! Application startup and server initialization.
//!
//! Builds the backend, catalog and session controller from the config,
//! serves the HTTP facade, and tears the controller down on shutdown.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::backend::create_backend;
use crate::catalog::create_catalog;
use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::routes;
use crate::session::SessionController;
use crate::state::AppState;

/// Wires the services described by `config` into an [`AppState`].
///
/// Starts the session controller, so it must run inside a Tokio runtime.
pub fn build_state(config: Arc<ConfigV1>) -> Result<AppState, String> {
    let backend = create_backend(&config.backend)?;
    let catalog = create_catalog(&config.catalog);
    let metrics = Metrics::new();
    let session = Arc::new(SessionController::start(
        backend.identity,
        backend.profiles,
        metrics.clone(),
    ));

    Ok(AppState {
        config,
        session,
        catalog,
        metrics,
    })
}

/// Initializes and runs the application server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the services cannot be built, the server fails to
/// bind to the configured address, or serving fails.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone())?;
    let session = state.session.clone();
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Starting server on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await
}

/// Resolves once `signal` fires. If the signal cannot be listened for, the
/// server keeps running instead of shutting down straight away.
async fn wait_for_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            tracing::error!(
                event_name = "server.signal.unavailable",
                event_domain = "server",
                "failed to listen for shutdown signal: {}",
                e
            );
            std::future::pending::<()>().await
        }
    }
}
