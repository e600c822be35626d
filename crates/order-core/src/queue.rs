//! Submission queue between the entry point and the worker pool.
//!
//! An unbounded FIFO of orders. Enqueueing never blocks. Workers dequeue
//! with a timeout and acknowledge each item once they are done with it, so
//! the queue can report both its depth and the number of items in flight.

use order_types::Order;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Errors that can occur when using the queue.
#[derive(Debug, Error)]
pub enum QueueError {
	#[error("Queue is closed")]
	Closed,
}

/// Unbounded, thread-safe FIFO of orders.
pub struct OrderQueue {
	sender: mpsc::UnboundedSender<Order>,
	receiver: Mutex<mpsc::UnboundedReceiver<Order>>,
	/// Items enqueued and not yet dequeued.
	depth: AtomicUsize,
	/// Items enqueued and not yet acknowledged.
	outstanding: AtomicUsize,
	closed: AtomicBool,
}

impl Default for OrderQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl OrderQueue {
	pub fn new() -> Self {
		let (sender, receiver) = mpsc::unbounded_channel();
		Self {
			sender,
			receiver: Mutex::new(receiver),
			depth: AtomicUsize::new(0),
			outstanding: AtomicUsize::new(0),
			closed: AtomicBool::new(false),
		}
	}

	/// Appends an order. Fails only once the queue has been closed.
	pub fn enqueue(&self, order: Order) -> Result<(), QueueError> {
		if self.is_closed() {
			return Err(QueueError::Closed);
		}

		// Count before sending so a fast consumer never sees the counters underflow.
		self.depth.fetch_add(1, Ordering::AcqRel);
		self.outstanding.fetch_add(1, Ordering::AcqRel);

		if self.sender.send(order).is_err() {
			saturating_decrement(&self.depth);
			saturating_decrement(&self.outstanding);
			return Err(QueueError::Closed);
		}
		Ok(())
	}

	/// Waits up to `timeout` for the next order.
	///
	/// Returns `None` when the timeout elapses, which is not an error.
	pub async fn dequeue(&self, timeout: Duration) -> Option<Order> {
		let next = tokio::time::timeout(timeout, async {
			let mut receiver = self.receiver.lock().await;
			receiver.recv().await
		})
		.await;

		match next {
			Ok(Some(order)) => {
				saturating_decrement(&self.depth);
				Some(order)
			},
			Ok(None) | Err(_) => None,
		}
	}

	/// Acknowledges one dequeued order.
	pub fn ack(&self) {
		saturating_decrement(&self.outstanding);
	}

	/// Number of enqueued orders that have not been acknowledged.
	pub fn outstanding(&self) -> usize {
		self.outstanding.load(Ordering::Acquire)
	}

	/// Current queue depth.
	pub fn len(&self) -> usize {
		self.depth.load(Ordering::Acquire)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Rejects further enqueues. Items already queued stay dequeueable.
	pub fn close(&self) {
		self.closed.store(true, Ordering::Release);
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}
}

fn saturating_decrement(counter: &AtomicUsize) {
	let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}

#[cfg(test)]
mod tests {
	use super::*;
	use order_types::NewOrder;
	use rust_decimal::Decimal;
	use std::sync::Arc;

	fn order(id: &str) -> Order {
		Order::pending(NewOrder {
			order_id: Some(id.to_string()),
			user_id: "u1".to_string(),
			item_ids: vec!["i1".to_string()],
			total_amount: Decimal::ONE,
		})
	}

	#[tokio::test]
	async fn test_fifo_and_counters() {
		let queue = OrderQueue::new();
		queue.enqueue(order("a")).unwrap();
		queue.enqueue(order("b")).unwrap();
		assert_eq!(queue.len(), 2);
		assert_eq!(queue.outstanding(), 2);

		let first = queue.dequeue(Duration::from_millis(10)).await.unwrap();
		assert_eq!(first.order_id, "a");
		assert_eq!(queue.len(), 1);
		assert_eq!(queue.outstanding(), 2);

		queue.ack();
		assert_eq!(queue.outstanding(), 1);

		let second = queue.dequeue(Duration::from_millis(10)).await.unwrap();
		assert_eq!(second.order_id, "b");
		queue.ack();
		assert!(queue.is_empty());
		assert_eq!(queue.outstanding(), 0);
	}

	#[tokio::test]
	async fn test_dequeue_timeout_returns_none() {
		let queue = OrderQueue::new();
		assert!(queue.dequeue(Duration::from_millis(20)).await.is_none());
	}

	#[tokio::test]
	async fn test_ack_saturates_at_zero() {
		let queue = OrderQueue::new();
		queue.ack();
		assert_eq!(queue.outstanding(), 0);
	}

	#[tokio::test]
	async fn test_closed_queue_rejects_enqueue() {
		let queue = OrderQueue::new();
		queue.enqueue(order("kept")).unwrap();
		queue.close();

		assert!(matches!(queue.enqueue(order("late")), Err(QueueError::Closed)));
		let kept = queue.dequeue(Duration::from_millis(10)).await.unwrap();
		assert_eq!(kept.order_id, "kept");
	}

	#[tokio::test]
	async fn test_waiting_consumer_receives_item() {
		let queue = Arc::new(OrderQueue::new());
		let consumer = {
			let queue = queue.clone();
			tokio::spawn(async move { queue.dequeue(Duration::from_secs(2)).await })
		};

		tokio::time::sleep(Duration::from_millis(20)).await;
		queue.enqueue(order("late-arrival")).unwrap();

		let received = consumer.await.unwrap().unwrap();
		assert_eq!(received.order_id, "late-arrival");
	}
}
