//! Metric types shared by the aggregate, the store and the reporting API.

use crate::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of a persisted metric.
///
/// Each name is a separate record in the store, so a flush is a set of
/// independent upserts rather than one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
	/// Number of orders that reached `COMPLETED`.
	TotalOrdersProcessed,
	/// Mean processing time at flush time. Informational only on restore.
	AvgProcessingTime,
	/// Current number of orders in the given status.
	StatusCount(OrderStatus),
}

impl MetricName {
	const STATUS_COUNT_PREFIX: &'static str = "status_count_";

	/// Returns the record key used in the metrics namespace.
	pub fn key(&self) -> String {
		match self {
			MetricName::TotalOrdersProcessed => "total_orders_processed".to_string(),
			MetricName::AvgProcessingTime => "avg_processing_time".to_string(),
			MetricName::StatusCount(status) => {
				format!("{}{}", Self::STATUS_COUNT_PREFIX, status.as_str())
			},
		}
	}

	/// Returns every metric name the pipeline persists.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::TotalOrdersProcessed, Self::AvgProcessingTime]
			.into_iter()
			.chain(OrderStatus::all().map(Self::StatusCount))
	}
}

impl fmt::Display for MetricName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.key())
	}
}

impl FromStr for MetricName {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"total_orders_processed" => Ok(Self::TotalOrdersProcessed),
			"avg_processing_time" => Ok(Self::AvgProcessingTime),
			other => other
				.strip_prefix(Self::STATUS_COUNT_PREFIX)
				.ok_or(())?
				.parse::<OrderStatus>()
				.map(Self::StatusCount),
		}
	}
}

/// A single persisted metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
	pub metric_name: String,
	/// Stored as text so counters and averages share one record shape.
	pub metric_value: String,
	pub updated_at: DateTime<Utc>,
}

impl MetricRecord {
	/// Creates a record for the given metric.
	pub fn new(name: MetricName, value: impl ToString, updated_at: DateTime<Utc>) -> Self {
		Self {
			metric_name: name.key(),
			metric_value: value.to_string(),
			updated_at,
		}
	}
}

/// Point-in-time view of the metrics aggregate, as reported by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
	pub total_orders_processed: u64,
	/// Mean processing time in seconds, rounded to two decimals.
	pub average_processing_time: f64,
	pub status_counts: BTreeMap<OrderStatus, u64>,
}

impl MetricsSnapshot {
	/// Returns the count for a status, zero when absent.
	pub fn count(&self, status: OrderStatus) -> u64 {
		self.status_counts.get(&status).copied().unwrap_or(0)
	}

	/// Sum of all status buckets.
	pub fn total_tracked(&self) -> u64 {
		self.status_counts.values().sum()
	}
}
