//! Pipeline engine tying the queue, the workers and the store together.
//!
//! The engine is the entry point for submissions and lookups. It owns the
//! submission queue, the metrics aggregate and the worker pool.

pub mod lifecycle;
pub mod workers;

use crate::handlers::OrderHandler;
use crate::metrics::MetricsAggregate;
use crate::queue::{OrderQueue, QueueError};
use crate::state::OrderStateMachine;
use order_config::Config;
use order_storage::{OrderStore, StorageError};
use order_types::{truncate_id, HealthResponse, MetricsSnapshot, NewOrder, Order, WorkerState};
use order_work::WorkService;
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use workers::WorkerPool;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Order already exists: {0}")]
	AlreadyExists(String),
	#[error("Maximum {max} orders allowed for load test, got {requested}")]
	LoadTestTooLarge { requested: usize, max: usize },
}

/// Main pipeline engine.
#[derive(Clone)]
pub struct PipelineEngine {
	pub(crate) config: Config,
	pub(crate) store: Arc<dyn OrderStore>,
	pub(crate) queue: Arc<OrderQueue>,
	pub(crate) metrics: Arc<MetricsAggregate>,
	pub(crate) order_handler: Arc<OrderHandler>,
	pub(crate) workers: Arc<WorkerPool>,
}

impl PipelineEngine {
	/// Creates a new engine over the given store and work step.
	pub fn new(config: Config, store: Arc<dyn OrderStore>, work: Arc<WorkService>) -> Self {
		let metrics = Arc::new(MetricsAggregate::new());
		let state_machine = Arc::new(OrderStateMachine::new(
			store.clone(),
			config.pipeline.retry.clone(),
		));

		let order_handler = Arc::new(OrderHandler::new(
			state_machine,
			work,
			metrics.clone(),
			store.clone(),
			config.pipeline.flush_every,
		));

		let workers = Arc::new(WorkerPool::new(config.pipeline.workers));

		Self {
			config,
			store,
			queue: Arc::new(OrderQueue::new()),
			metrics,
			order_handler,
			workers,
		}
	}

	/// Admits a new order.
	///
	/// Assigns the id when absent, persists the order as `PENDING`, counts
	/// it and queues it for a worker. Nothing is written once the engine
	/// has shut down.
	pub async fn submit(&self, new_order: NewOrder) -> Result<Order, EngineError> {
		if self.queue.is_closed() {
			return Err(EngineError::Service(QueueError::Closed.to_string()));
		}

		let order = Order::pending(new_order);

		self.store
			.create_order(&order)
			.await
			.map_err(|e| match e {
				StorageError::AlreadyExists(id) => EngineError::AlreadyExists(id),
				other => EngineError::Storage(other.to_string()),
			})?;

		self.metrics.record_submission();
		self.queue
			.enqueue(order.clone())
			.map_err(|e| EngineError::Service(e.to_string()))?;

		tracing::info!(
			order_id = %truncate_id(&order.order_id),
			items = order.item_ids.len(),
			"Order received"
		);
		Ok(order)
	}

	/// Creates `count` synthetic orders through the normal submission path.
	///
	/// Requests above the configured maximum are rejected before anything
	/// is written.
	pub async fn submit_load_test(&self, count: usize) -> Result<Vec<String>, EngineError> {
		let max = self.config.pipeline.load_test_max;
		if count > max {
			return Err(EngineError::LoadTestTooLarge {
				requested: count,
				max,
			});
		}

		let orders: Vec<NewOrder> = {
			let mut rng = rand::thread_rng();
			(0..count).map(|i| synthetic_order(i, &mut rng)).collect()
		};

		let mut order_ids = Vec::with_capacity(count);
		for new_order in orders {
			order_ids.push(self.submit(new_order).await?.order_id);
		}

		tracing::info!(count, "Created load test orders");
		Ok(order_ids)
	}

	/// Looks up an order, `None` when the id is unknown.
	pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, EngineError> {
		self.store
			.get_order(order_id)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))
	}

	/// Current metrics.
	pub fn metrics_snapshot(&self) -> MetricsSnapshot {
		self.metrics.snapshot()
	}

	/// Queue depth and worker liveness.
	///
	/// Reported as `degraded` when any worker is missing or has stopped.
	pub fn health(&self) -> HealthResponse {
		let workers = self.workers.health();
		let degraded = workers.len() < self.workers.size()
			|| workers.iter().any(|w| w.state == WorkerState::Stopped);

		HealthResponse {
			status: if degraded { "degraded" } else { "ok" }.to_string(),
			queue_depth: self.queue.len(),
			outstanding: self.queue.outstanding(),
			workers,
		}
	}

	/// Spawns the worker pool. Safe to call more than once.
	pub fn start(&self) {
		self.workers.start(
			self.queue.clone(),
			self.order_handler.clone(),
			self.config.pipeline.dequeue_timeout(),
		);
	}

	/// Starts the workers and waits for ctrl-c.
	///
	/// Call `shutdown` afterwards to stop the workers and flush metrics.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.start();

		tokio::signal::ctrl_c()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the order store.
	pub fn store(&self) -> &Arc<dyn OrderStore> {
		&self.store
	}
}

/// Builds the `index`-th synthetic order of a load test.
fn synthetic_order(index: usize, rng: &mut impl Rng) -> NewOrder {
	let item_count = rng.gen_range(1..=4);
	NewOrder {
		order_id: Some(format!("test-order-{}", Uuid::new_v4())),
		user_id: format!("test-user-{}", index % 100),
		item_ids: (1..=item_count).map(|i| format!("item-{}", i)).collect(),
		total_amount: Decimal::new(rng.gen_range(1_000..=100_000), 2),
	}
}
