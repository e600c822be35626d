//! Health endpoint reporting queue depth and worker liveness.

use order_core::PipelineEngine;
use order_types::HealthResponse;

pub fn get_health(engine: &PipelineEngine) -> HealthResponse {
	let health = engine.health();
	if health.status != "ok" {
		tracing::debug!(
			status = %health.status,
			workers = health.workers.len(),
			"Health check reports a degraded pool"
		);
	}
	health
}
