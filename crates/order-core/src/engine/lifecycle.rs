//! Lifecycle management for the pipeline engine.
//!
//! Startup restores persisted metrics before any worker runs. Shutdown stops
//! the workers after their current order and writes a final metrics flush.

use super::{EngineError, PipelineEngine};

impl PipelineEngine {
	/// Restores persisted metrics. Call before `start` or `run`.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!("Initializing pipeline engine");

		let records = self
			.store
			.load_metrics()
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;
		self.metrics.restore(&records);

		let snapshot = self.metrics.snapshot();
		tracing::info!(
			records = records.len(),
			total_processed = snapshot.total_orders_processed,
			pending = snapshot.count(order_types::OrderStatus::Pending),
			"Restored metrics"
		);
		Ok(())
	}

	/// Stops accepting orders, stops the workers and flushes metrics.
	///
	/// Orders still queued are left in storage as `PENDING`.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down pipeline engine");

		self.queue.close();
		self.workers.stop().await;

		self.metrics
			.flush(self.store.as_ref())
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;

		tracing::info!(
			queued = self.queue.len(),
			total_processed = self.metrics.snapshot().total_orders_processed,
			"Pipeline stopped"
		);
		Ok(())
	}
}
