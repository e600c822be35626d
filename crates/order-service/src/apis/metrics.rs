//! Metrics endpoint.

use order_core::PipelineEngine;
use order_types::MetricsSnapshot;

/// Returns the live metrics aggregate.
///
/// The average processing time only covers orders completed since the
/// process started.
pub fn get_metrics(engine: &PipelineEngine) -> MetricsSnapshot {
	engine.metrics_snapshot()
}
