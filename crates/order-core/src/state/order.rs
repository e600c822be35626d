//! Order state machine implementation.
//!
//! Orders move `PENDING -> PROCESSING -> COMPLETED` and never backwards.
//! Every write is checked against the stored status first. Status writes go
//! through the order store with bounded exponential backoff; an unknown
//! order or a stale transition is reported immediately instead of retried.

use backoff::ExponentialBackoffBuilder;
use once_cell::sync::Lazy;
use order_config::RetryConfig;
use order_storage::OrderStore;
use order_storage::StorageError;
use order_types::{truncate_id, Order, OrderStatus};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order not found: {0}")]
	OrderNotFound(String),
}

/// Allowed next states for each status.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Pending,
		HashSet::from([OrderStatus::Processing]),
	);
	m.insert(
		OrderStatus::Processing,
		HashSet::from([OrderStatus::Completed]),
	);
	m.insert(OrderStatus::Completed, HashSet::new()); // terminal
	m
});

/// Validates and persists order status transitions.
pub struct OrderStateMachine {
	store: Arc<dyn OrderStore>,
	retry: RetryConfig,
}

impl OrderStateMachine {
	pub fn new(store: Arc<dyn OrderStore>, retry: RetryConfig) -> Self {
		Self { store, retry }
	}

	/// Checks if a state transition is valid
	pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
		TRANSITIONS
			.get(&from)
			.is_some_and(|set| set.contains(&to))
	}

	/// Persists `from -> to` for the given order.
	///
	/// The stored order is read on every attempt and the write goes ahead
	/// only while its status is still `from`. Any other stored status fails
	/// with `InvalidTransition` carrying the stored status as `from`.
	///
	/// Transient storage failures are retried until the configured elapsed
	/// time runs out. The last storage error is returned if it never succeeds.
	pub async fn transition(
		&self,
		order_id: &str,
		from: OrderStatus,
		to: OrderStatus,
	) -> Result<(), OrderStateError> {
		if !Self::is_valid_transition(from, to) {
			return Err(OrderStateError::InvalidTransition { from, to });
		}

		let policy = ExponentialBackoffBuilder::new()
			.with_initial_interval(Duration::from_millis(self.retry.initial_interval_ms))
			.with_max_interval(Duration::from_millis(self.retry.max_interval_ms))
			.with_max_elapsed_time(Some(Duration::from_millis(self.retry.max_elapsed_ms)))
			.build();
		let written = &AtomicBool::new(false);

		backoff::future::retry(policy, || async move {
			let order = match self.store.get_order(order_id).await {
				Ok(Some(order)) => order,
				Ok(None) => {
					return Err(backoff::Error::permanent(OrderStateError::OrderNotFound(
						order_id.to_string(),
					)))
				},
				Err(e) => return Err(retryable(order_id, to, e)),
			};

			if order.status != from {
				// An earlier attempt may have landed before its error came back.
				if order.status == to && written.load(Ordering::Acquire) {
					return Ok(());
				}
				return Err(backoff::Error::permanent(
					OrderStateError::InvalidTransition {
						from: order.status,
						to,
					},
				));
			}

			written.store(true, Ordering::Release);
			match self.store.update_order_status(order_id, to).await {
				Ok(true) => Ok(()),
				Ok(false) => Err(backoff::Error::permanent(OrderStateError::OrderNotFound(
					order_id.to_string(),
				))),
				Err(e) => Err(retryable(order_id, to, e)),
			}
		})
		.await
	}

	/// Gets an order by ID, `None` when it does not exist.
	pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, OrderStateError> {
		self.store
			.get_order(order_id)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))
	}
}

fn retryable(
	order_id: &str,
	to: OrderStatus,
	error: StorageError,
) -> backoff::Error<OrderStateError> {
	tracing::warn!(
		order_id = %truncate_id(order_id),
		status = %to,
		error = %error,
		"Status update failed, retrying"
	);
	backoff::Error::transient(OrderStateError::Storage(error.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use order_storage::{implementations::memory::MemoryStorage, StorageService};
	use order_types::{MetricRecord, NewOrder};
	use rust_decimal::Decimal;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn fast_retry() -> RetryConfig {
		RetryConfig {
			initial_interval_ms: 1,
			max_interval_ms: 5,
			max_elapsed_ms: 100,
		}
	}

	fn order(id: &str) -> Order {
		Order::pending(NewOrder {
			order_id: Some(id.to_string()),
			user_id: "u1".to_string(),
			item_ids: vec!["i1".to_string()],
			total_amount: Decimal::new(4250, 2),
		})
	}

	/// Store whose status updates fail a fixed number of times first.
	///
	/// With `write_before_failing` the failing updates still reach storage,
	/// like a write whose acknowledgement is lost.
	struct FlakyStore {
		inner: StorageService,
		failures_left: AtomicUsize,
		attempts: AtomicUsize,
		write_before_failing: bool,
	}

	impl FlakyStore {
		fn new(failures: usize) -> Self {
			Self {
				inner: StorageService::new(Box::new(MemoryStorage::new())),
				failures_left: AtomicUsize::new(failures),
				attempts: AtomicUsize::new(0),
				write_before_failing: false,
			}
		}

		fn losing_acks(failures: usize) -> Self {
			Self {
				write_before_failing: true,
				..Self::new(failures)
			}
		}
	}

	#[async_trait]
	impl OrderStore for FlakyStore {
		async fn create_order(&self, order: &Order) -> Result<(), StorageError> {
			self.inner.create_order(order).await
		}

		async fn get_order(&self, order_id: &str) -> Result<Option<Order>, StorageError> {
			self.inner.get_order(order_id).await
		}

		async fn update_order_status(
			&self,
			order_id: &str,
			status: OrderStatus,
		) -> Result<bool, StorageError> {
			self.attempts.fetch_add(1, Ordering::SeqCst);
			let failing = self
				.failures_left
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
				.is_ok();
			if failing {
				if self.write_before_failing {
					self.inner.update_order_status(order_id, status).await?;
				}
				return Err(StorageError::Backend("disk unavailable".into()));
			}
			self.inner.update_order_status(order_id, status).await
		}

		async fn load_metrics(&self) -> Result<Vec<MetricRecord>, StorageError> {
			self.inner.load_metrics().await
		}

		async fn save_metrics(&self, records: &[MetricRecord]) -> Result<(), StorageError> {
			self.inner.save_metrics(records).await
		}
	}

	#[test]
	fn test_transition_table() {
		use OrderStatus::*;
		assert!(OrderStateMachine::is_valid_transition(Pending, Processing));
		assert!(OrderStateMachine::is_valid_transition(Processing, Completed));

		assert!(!OrderStateMachine::is_valid_transition(Pending, Completed));
		assert!(!OrderStateMachine::is_valid_transition(Processing, Pending));
		assert!(!OrderStateMachine::is_valid_transition(Completed, Pending));
		assert!(!OrderStateMachine::is_valid_transition(Completed, Processing));
		assert!(!OrderStateMachine::is_valid_transition(Completed, Completed));
	}

	#[tokio::test]
	async fn test_transition_persists_status() {
		let store = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		store.create_order(&order("sm-1")).await.unwrap();
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		machine
			.transition("sm-1", OrderStatus::Pending, OrderStatus::Processing)
			.await
			.unwrap();
		let loaded = machine.get_order("sm-1").await.unwrap().unwrap();
		assert_eq!(loaded.status, OrderStatus::Processing);

		machine
			.transition("sm-1", OrderStatus::Processing, OrderStatus::Completed)
			.await
			.unwrap();
		let loaded = machine.get_order("sm-1").await.unwrap().unwrap();
		assert_eq!(loaded.status, OrderStatus::Completed);
	}

	#[tokio::test]
	async fn test_invalid_transition_rejected_without_write() {
		let store = Arc::new(FlakyStore::new(0));
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		let result = machine
			.transition("any", OrderStatus::Completed, OrderStatus::Pending)
			.await;
		assert!(matches!(
			result,
			Err(OrderStateError::InvalidTransition {
				from: OrderStatus::Completed,
				to: OrderStatus::Pending
			})
		));
		assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_missing_order_not_retried() {
		let store = Arc::new(FlakyStore::new(0));
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		let result = machine
			.transition("ghost", OrderStatus::Pending, OrderStatus::Processing)
			.await;
		assert!(matches!(result, Err(OrderStateError::OrderNotFound(id)) if id == "ghost"));
		assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
		assert!(machine.get_order("ghost").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_completed_order_never_regresses() {
		let store = Arc::new(FlakyStore::new(0));
		store.create_order(&order("done")).await.unwrap();
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		machine
			.transition("done", OrderStatus::Pending, OrderStatus::Processing)
			.await
			.unwrap();
		machine
			.transition("done", OrderStatus::Processing, OrderStatus::Completed)
			.await
			.unwrap();
		let writes = store.attempts.load(Ordering::SeqCst);

		let result = machine
			.transition("done", OrderStatus::Pending, OrderStatus::Processing)
			.await;
		assert!(matches!(
			result,
			Err(OrderStateError::InvalidTransition {
				from: OrderStatus::Completed,
				to: OrderStatus::Processing
			})
		));
		assert_eq!(store.attempts.load(Ordering::SeqCst), writes);

		let stored = machine.get_order("done").await.unwrap().unwrap();
		assert_eq!(stored.status, OrderStatus::Completed);
	}

	#[tokio::test]
	async fn test_repeated_transition_is_rejected() {
		let store = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		store.create_order(&order("twice")).await.unwrap();
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		machine
			.transition("twice", OrderStatus::Pending, OrderStatus::Processing)
			.await
			.unwrap();
		let result = machine
			.transition("twice", OrderStatus::Pending, OrderStatus::Processing)
			.await;
		assert!(matches!(
			result,
			Err(OrderStateError::InvalidTransition {
				from: OrderStatus::Processing,
				..
			})
		));
	}

	#[tokio::test]
	async fn test_processing_is_never_skipped() {
		let store = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		store.create_order(&order("behind")).await.unwrap();
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		let result = machine
			.transition("behind", OrderStatus::Processing, OrderStatus::Completed)
			.await;
		assert!(matches!(
			result,
			Err(OrderStateError::InvalidTransition {
				from: OrderStatus::Pending,
				to: OrderStatus::Completed
			})
		));
		let stored = machine.get_order("behind").await.unwrap().unwrap();
		assert_eq!(stored.status, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_lost_acknowledgement_counts_as_success() {
		let store = Arc::new(FlakyStore::losing_acks(1));
		store.create_order(&order("lost-ack")).await.unwrap();
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		machine
			.transition("lost-ack", OrderStatus::Pending, OrderStatus::Processing)
			.await
			.unwrap();
		assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
		let stored = machine.get_order("lost-ack").await.unwrap().unwrap();
		assert_eq!(stored.status, OrderStatus::Processing);
	}

	#[tokio::test]
	async fn test_transient_failures_are_retried() {
		let store = Arc::new(FlakyStore::new(2));
		store.create_order(&order("flaky")).await.unwrap();
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		machine
			.transition("flaky", OrderStatus::Pending, OrderStatus::Processing)
			.await
			.unwrap();
		assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_retries_give_up_after_elapsed_bound() {
		let store = Arc::new(FlakyStore::new(usize::MAX));
		store.create_order(&order("down")).await.unwrap();
		let machine = OrderStateMachine::new(store.clone(), fast_retry());

		let result = machine
			.transition("down", OrderStatus::Pending, OrderStatus::Processing)
			.await;
		assert!(matches!(result, Err(OrderStateError::Storage(_))));
		assert!(store.attempts.load(Ordering::SeqCst) > 1);
	}
}
