//! In-memory metrics aggregate for the pipeline.
//!
//! Tracks how many orders sit in each status, how many have completed, and
//! how long each work step took. All counters live behind one mutex so a
//! transition moves a count between buckets atomically. The mutex is never
//! held across storage I/O: flushing copies the counters first.

use chrono::Utc;
use order_storage::{OrderStore, StorageError};
use order_types::{mean, round_to, MetricName, MetricRecord, MetricsSnapshot, OrderStatus};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug)]
struct MetricsState {
	status_counts: BTreeMap<OrderStatus, u64>,
	total_processed: u64,
	/// Work step durations in seconds since startup.
	processing_times: Vec<f64>,
}

impl Default for MetricsState {
	fn default() -> Self {
		Self {
			status_counts: OrderStatus::all().map(|status| (status, 0)).collect(),
			total_processed: 0,
			processing_times: Vec::new(),
		}
	}
}

/// Shared counters for submitted, in-flight and completed orders.
#[derive(Debug, Default)]
pub struct MetricsAggregate {
	state: Mutex<MetricsState>,
}

impl MetricsAggregate {
	pub fn new() -> Self {
		Self::default()
	}

	/// Counts a newly admitted order as `PENDING`.
	pub fn record_submission(&self) {
		let mut state = self.state.lock();
		*state.status_counts.entry(OrderStatus::Pending).or_insert(0) += 1;
	}

	/// Moves one count from `from` to `to`. The source never drops below zero.
	pub fn record_transition(&self, from: OrderStatus, to: OrderStatus) {
		let mut state = self.state.lock();
		let source = state.status_counts.entry(from).or_insert(0);
		*source = source.saturating_sub(1);
		*state.status_counts.entry(to).or_insert(0) += 1;
	}

	/// Counts a completion and records its duration.
	///
	/// Returns the new completion total so the caller can decide whether
	/// this completion crosses a flush boundary.
	pub fn record_completion(&self, duration: Duration) -> u64 {
		let mut state = self.state.lock();
		state.total_processed += 1;
		state.processing_times.push(duration.as_secs_f64());
		state.total_processed
	}

	/// Consistent view of all counters.
	pub fn snapshot(&self) -> MetricsSnapshot {
		let state = self.state.lock();
		MetricsSnapshot {
			total_orders_processed: state.total_processed,
			average_processing_time: round_to(mean(&state.processing_times), 2),
			status_counts: state.status_counts.clone(),
		}
	}

	/// Persisted form of the current counters, stamped with the flush time.
	///
	/// The average is stored unrounded; rounding applies to reporting only.
	pub fn records(&self) -> Vec<MetricRecord> {
		let (total_processed, average, status_counts) = {
			let state = self.state.lock();
			(
				state.total_processed,
				mean(&state.processing_times),
				state.status_counts.clone(),
			)
		};
		let now = Utc::now();

		let mut records = vec![
			MetricRecord::new(MetricName::TotalOrdersProcessed, total_processed, now),
			MetricRecord::new(MetricName::AvgProcessingTime, average, now),
		];
		records.extend(OrderStatus::all().map(|status| {
			let count = status_counts.get(&status).copied().unwrap_or(0);
			MetricRecord::new(MetricName::StatusCount(status), count, now)
		}));
		records
	}

	/// Writes the current counters to the store.
	///
	/// Concurrent flushes may land in any order; each one is a complete set
	/// of upserts so the last write wins.
	pub async fn flush(&self, store: &dyn OrderStore) -> Result<(), StorageError> {
		let records = self.records();
		store.save_metrics(&records).await
	}

	/// Applies persisted records on startup.
	///
	/// Only the completion total and the status counts are restored. The
	/// average is informational and restarts from an empty sample set.
	pub fn restore(&self, records: &[MetricRecord]) {
		let mut state = self.state.lock();

		for record in records {
			let Ok(name) = record.metric_name.parse::<MetricName>() else {
				tracing::debug!(metric = %record.metric_name, "Ignoring unknown metric");
				continue;
			};

			match name {
				MetricName::AvgProcessingTime => {
					tracing::info!(
						value = %record.metric_value,
						"Previous average processing time"
					);
				},
				MetricName::TotalOrdersProcessed => match record.metric_value.parse::<u64>() {
					Ok(value) => state.total_processed = value,
					Err(_) => warn_unparsable(record),
				},
				MetricName::StatusCount(status) => match record.metric_value.parse::<u64>() {
					Ok(value) => {
						state.status_counts.insert(status, value);
					},
					Err(_) => warn_unparsable(record),
				},
			}
		}
	}
}

fn warn_unparsable(record: &MetricRecord) {
	tracing::warn!(
		metric = %record.metric_name,
		value = %record.metric_value,
		"Ignoring unparsable metric value"
	);
}
