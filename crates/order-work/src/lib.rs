//! Work step module for the order pipeline.
//!
//! A work step is the unit of processing a worker performs while it holds an
//! order in `PROCESSING`. Implementations are pluggable and selected from the
//! `[work]` configuration section through the registry below.

use async_trait::async_trait;
use order_types::{truncate_id, ConfigSchema, ImplementationRegistry, Order};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod random_delay;
}

/// Errors that can occur while creating or running a work step.
#[derive(Debug, Error)]
pub enum WorkError {
	/// Error that occurs when the work step configuration is invalid.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
	/// Error that occurs when the work itself fails for an order.
	#[error("Work failed: {0}")]
	Failed(String),
}

/// Trait defining the interface for work step implementations.
///
/// A work step may take arbitrarily long. The worker running it holds the
/// order for the whole call and takes no other order meanwhile.
#[async_trait]
pub trait WorkStep: Send + Sync {
	/// Returns the configuration schema for this work step.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Performs the work for one order.
	async fn perform(&self, order: &Order) -> Result<(), WorkError>;
}

/// Type alias for work step factory functions.
pub type WorkFactory = fn(&toml::Value) -> Result<Box<dyn WorkStep>, WorkError>;

/// Registry trait for work step implementations.
pub trait WorkRegistry: ImplementationRegistry<Factory = WorkFactory> {}

/// Get all registered work step implementations.
pub fn get_all_implementations() -> Vec<(&'static str, WorkFactory)> {
	use implementations::random_delay;

	vec![(random_delay::Registry::NAME, random_delay::Registry::factory())]
}

/// Service that runs the configured work step and times it.
pub struct WorkService {
	step: Box<dyn WorkStep>,
}

impl WorkService {
	/// Creates a new WorkService around the given step.
	pub fn new(step: Box<dyn WorkStep>) -> Self {
		Self { step }
	}

	/// Runs the work step for `order` and returns how long it took.
	pub async fn perform(&self, order: &Order) -> Result<Duration, WorkError> {
		let started = Instant::now();
		self.step.perform(order).await?;
		let elapsed = started.elapsed();

		tracing::debug!(
			order_id = %truncate_id(&order.order_id),
			elapsed_ms = elapsed.as_millis() as u64,
			"Work step finished"
		);
		Ok(elapsed)
	}
}
