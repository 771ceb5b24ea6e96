//! Shared application state.
//!
//! Holds what every handler needs: the configuration, the session
//! controller, the catalog and the metrics recorder.

use crate::catalog::Catalog;
use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::session::SessionController;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// The one session controller for this process.
    pub session: Arc<SessionController>,
    pub catalog: Arc<dyn Catalog>,
    /// Metrics collector for Prometheus.
    pub metrics: Metrics,
}
