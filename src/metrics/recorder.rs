//! Metrics recording implementation using Prometheus.

use prometheus::{
    CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
};
use std::sync::Arc;

/// Trait for recording application metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a session command (login, signup, ...) with its outcome.
    fn record_command(&self, command: &str, result: &str);

    /// Records how long a session command took.
    fn record_command_duration(&self, command: &str, duration_secs: f64);

    /// Records one reconciliation of the session state.
    fn record_reconciliation(&self, outcome: &str);

    /// Records a catalog lookup.
    fn record_catalog_request(&self, operation: &str, result: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Session metrics
    commands_total: CounterVec,
    command_duration_seconds: HistogramVec,
    reconciliations_total: CounterVec,

    // Catalog metrics
    catalog_requests_total: CounterVec,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let commands_total = register_counter_vec_with_registry!(
            Opts::new(
                "session_commands_total",
                "Total number of session commands by result"
            ),
            &["command", "result"],
            registry.clone()
        )
        .expect("Failed to register session_commands_total");

        let command_duration_seconds = register_histogram_vec_with_registry!(
            "session_command_duration_seconds",
            "Session command duration in seconds",
            &["command"],
            vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
            ],
            registry.clone()
        )
        .expect("Failed to register session_command_duration_seconds");

        let reconciliations_total = register_counter_vec_with_registry!(
            Opts::new(
                "session_reconciliations_total",
                "Total number of session state reconciliations by outcome"
            ),
            &["outcome"],
            registry.clone()
        )
        .expect("Failed to register session_reconciliations_total");

        let catalog_requests_total = register_counter_vec_with_registry!(
            Opts::new("catalog_requests_total", "Total catalog lookups by result"),
            &["operation", "result"],
            registry.clone()
        )
        .expect("Failed to register catalog_requests_total");

        Metrics {
            registry,
            commands_total,
            command_duration_seconds,
            reconciliations_total,
            catalog_requests_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for Metrics {
    fn record_command(&self, command: &str, result: &str) {
        self.commands_total
            .with_label_values(&[command, result])
            .inc();
    }

    fn record_command_duration(&self, command: &str, duration_secs: f64) {
        self.command_duration_seconds
            .with_label_values(&[command])
            .observe(duration_secs);
    }

    fn record_reconciliation(&self, outcome: &str) {
        self.reconciliations_total
            .with_label_values(&[outcome])
            .inc();
    }

    fn record_catalog_request(&self, operation: &str, result: &str) {
        self.catalog_requests_total
            .with_label_values(&[operation, result])
            .inc();
    }
}
