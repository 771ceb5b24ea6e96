//! Prometheus metrics for session commands, reconciliations and catalog
//! lookups.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
