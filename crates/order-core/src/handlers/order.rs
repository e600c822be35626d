//! Order handler for processing one dequeued order.
//!
//! Drives an order from `PENDING` through the work step to `COMPLETED`,
//! keeping the metrics aggregate in step with each transition and flushing
//! it to the store on the configured cadence.

use crate::metrics::MetricsAggregate;
use crate::state::{OrderStateError, OrderStateMachine};
use order_storage::OrderStore;
use order_types::{truncate_id, Order, OrderStatus};
use order_work::WorkService;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while processing an order.
#[derive(Debug, Error)]
pub enum HandlerError {
	#[error("Work error: {0}")]
	Work(String),
	#[error("Order already advanced: {0}")]
	AlreadyAdvanced(String),
}

/// Handler that runs the processing cycle for a single order.
pub struct OrderHandler {
	state_machine: Arc<OrderStateMachine>,
	work: Arc<WorkService>,
	metrics: Arc<MetricsAggregate>,
	store: Arc<dyn OrderStore>,
	flush_every: u64,
}

impl OrderHandler {
	pub fn new(
		state_machine: Arc<OrderStateMachine>,
		work: Arc<WorkService>,
		metrics: Arc<MetricsAggregate>,
		store: Arc<dyn OrderStore>,
		flush_every: u64,
	) -> Self {
		Self {
			state_machine,
			work,
			metrics,
			store,
			flush_every,
		}
	}

	/// Processes one order end to end.
	///
	/// A failed status write is logged and the metrics still move, so the
	/// counters reflect what the pipeline did even when storage lags. A
	/// failed work step leaves the order in `PROCESSING` and is returned.
	/// An order whose stored status is already past the step is left alone.
	#[instrument(skip_all, fields(order_id = %truncate_id(&order.order_id)))]
	pub async fn handle(&self, order: Order) -> Result<(), HandlerError> {
		self.advance(&order, OrderStatus::Pending, OrderStatus::Processing)
			.await?;

		let elapsed = self
			.work
			.perform(&order)
			.await
			.map_err(|e| HandlerError::Work(e.to_string()))?;

		self.advance(&order, OrderStatus::Processing, OrderStatus::Completed)
			.await?;

		let total = self.metrics.record_completion(elapsed);
		tracing::info!(
			elapsed_ms = elapsed.as_millis() as u64,
			total_processed = total,
			"Order completed"
		);

		if self.flush_every > 0 && total % self.flush_every == 0 {
			match self.metrics.flush(self.store.as_ref()).await {
				Ok(()) => tracing::debug!(total_processed = total, "Flushed metrics"),
				Err(e) => tracing::warn!(error = %e, "Failed to flush metrics"),
			}
		}

		Ok(())
	}

	async fn advance(
		&self,
		order: &Order,
		from: OrderStatus,
		to: OrderStatus,
	) -> Result<(), HandlerError> {
		match self
			.state_machine
			.transition(&order.order_id, from, to)
			.await
		{
			Ok(()) => {},
			// Statuses are ordered along the lifecycle.
			Err(e @ OrderStateError::InvalidTransition { from: stored, .. }) if stored > from => {
				tracing::warn!(to = %to, error = %e, "Skipping order");
				return Err(HandlerError::AlreadyAdvanced(e.to_string()));
			},
			Err(e) => {
				tracing::error!(
					from = %from,
					to = %to,
					error = %e,
					"Failed to persist status, continuing"
				);
			},
		}
		self.metrics.record_transition(from, to);
		Ok(())
	}
}
