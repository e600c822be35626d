//! Worker pool draining the submission queue.
//!
//! Each worker is an independent task that dequeues, processes and acks one
//! order at a time. Errors and panics from a single order are contained in
//! the loop so the pool never shrinks. Every worker publishes its state to a
//! shared liveness map that backs the health endpoint.

use crate::handlers::OrderHandler;
use crate::queue::OrderQueue;
use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use order_types::{truncate_id, WorkerHealth, WorkerState};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fixed-size set of workers sharing one queue and one handler.
pub struct WorkerPool {
	size: usize,
	liveness: Arc<DashMap<usize, WorkerHealth>>,
	shutdown: watch::Sender<bool>,
	handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
	pub fn new(size: usize) -> Self {
		let (shutdown, _) = watch::channel(false);
		Self {
			size,
			liveness: Arc::new(DashMap::new()),
			shutdown,
			handles: parking_lot::Mutex::new(Vec::new()),
		}
	}

	/// Spawns the workers. Calling this on a running pool does nothing.
	pub fn start(
		&self,
		queue: Arc<OrderQueue>,
		handler: Arc<OrderHandler>,
		dequeue_timeout: Duration,
	) {
		let mut handles = self.handles.lock();
		if !handles.is_empty() {
			return;
		}

		for id in 0..self.size {
			self.liveness.insert(id, idle(id));
			let worker = Worker {
				id,
				queue: queue.clone(),
				handler: handler.clone(),
				dequeue_timeout,
				liveness: self.liveness.clone(),
			};
			handles.push(tokio::spawn(worker.run(self.shutdown.subscribe())));
		}

		tracing::info!(workers = self.size, "Started worker pool");
	}

	/// Signals every worker to stop after its current order and waits for them.
	pub async fn stop(&self) {
		self.shutdown.send_replace(true);

		let handles = std::mem::take(&mut *self.handles.lock());
		for handle in handles {
			if let Err(e) = handle.await {
				tracing::error!(error = %e, "Worker task ended abnormally");
			}
		}
	}

	/// Liveness of every worker, ordered by id.
	pub fn health(&self) -> Vec<WorkerHealth> {
		let mut workers: Vec<_> = self
			.liveness
			.iter()
			.map(|entry| entry.value().clone())
			.collect();
		workers.sort_by_key(|w| w.id);
		workers
	}

	pub fn size(&self) -> usize {
		self.size
	}
}

fn idle(id: usize) -> WorkerHealth {
	WorkerHealth {
		id,
		state: WorkerState::Idle,
		current_order: None,
		processed: 0,
		failures: 0,
		last_active: Utc::now(),
	}
}

struct Worker {
	id: usize,
	queue: Arc<OrderQueue>,
	handler: Arc<OrderHandler>,
	dequeue_timeout: Duration,
	liveness: Arc<DashMap<usize, WorkerHealth>>,
}

impl Worker {
	async fn run(self, mut shutdown: watch::Receiver<bool>) {
		tracing::debug!(worker = self.id, "Worker started");

		loop {
			if *shutdown.borrow() {
				break;
			}

			let next = tokio::select! {
				changed = shutdown.changed() => {
					if changed.is_err() {
						break;
					}
					continue;
				}
				order = self.queue.dequeue(self.dequeue_timeout) => order,
			};

			let Some(order) = next else {
				continue;
			};

			let order_id = order.order_id.clone();
			self.update(|w| {
				w.state = WorkerState::Busy;
				w.current_order = Some(order_id.clone());
			});

			let outcome = AssertUnwindSafe(self.handler.handle(order))
				.catch_unwind()
				.await;

			let failed = match outcome {
				Ok(Ok(())) => false,
				Ok(Err(e)) => {
					tracing::error!(
						worker = self.id,
						order_id = %truncate_id(&order_id),
						error = %e,
						"Order processing failed"
					);
					true
				},
				Err(panic) => {
					tracing::error!(
						worker = self.id,
						order_id = %truncate_id(&order_id),
						panic = %panic_message(panic.as_ref()),
						"Order processing panicked"
					);
					true
				},
			};

			self.update(|w| {
				w.state = WorkerState::Idle;
				w.current_order = None;
				if failed {
					w.failures += 1;
				} else {
					w.processed += 1;
				}
			});
			self.queue.ack();
		}

		self.update(|w| {
			w.state = WorkerState::Stopped;
			w.current_order = None;
		});
		tracing::debug!(worker = self.id, "Worker stopped");
	}

	fn update(&self, apply: impl FnOnce(&mut WorkerHealth)) {
		let mut entry = self.liveness.entry(self.id).or_insert_with(|| idle(self.id));
		apply(entry.value_mut());
		entry.last_active = Utc::now();
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic".to_string()
	}
}
