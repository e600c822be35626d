//! Order types for the pipeline.
//!
//! An order is admitted with status `PENDING`, picked up by a worker which
//! moves it to `PROCESSING`, and finally lands in the terminal `COMPLETED`
//! state. Nothing in the pipeline ever moves an order backwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A submitted order as persisted by the order store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier, caller supplied or generated at submission.
	pub order_id: String,
	/// Identifier of the user who placed the order.
	pub user_id: String,
	/// Ordered list of item identifiers. Never empty.
	pub item_ids: Vec<String>,
	/// Total amount of the order.
	#[serde(with = "rust_decimal::serde::float")]
	pub total_amount: Decimal,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Time the order was admitted.
	pub created_at: DateTime<Utc>,
	/// Time of the last status change.
	pub updated_at: DateTime<Utc>,
}

impl Order {
	/// Builds a `PENDING` order from a validated submission.
	///
	/// A UUID v4 is assigned when the submission carries no identifier.
	pub fn pending(new_order: NewOrder) -> Self {
		let now = Utc::now();
		Self {
			order_id: new_order
				.order_id
				.unwrap_or_else(|| Uuid::new_v4().to_string()),
			user_id: new_order.user_id,
			item_ids: new_order.item_ids,
			total_amount: new_order.total_amount,
			status: OrderStatus::Pending,
			created_at: now,
			updated_at: now,
		}
	}
}

/// A validated submission that has not been admitted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
	/// Optional caller supplied identifier.
	pub order_id: Option<String>,
	pub user_id: String,
	pub item_ids: Vec<String>,
	pub total_amount: Decimal,
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
	/// Admitted and waiting in the submission queue.
	Pending,
	/// Held by a worker.
	Processing,
	/// Finished. Terminal.
	Completed,
}

impl OrderStatus {
	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "PENDING",
			OrderStatus::Processing => "PROCESSING",
			OrderStatus::Completed => "COMPLETED",
		}
	}

	/// Returns an iterator over all statuses in lifecycle order.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Pending, Self::Processing, Self::Completed].into_iter()
	}

	/// Whether no further transition is possible from this status.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Completed)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"PENDING" => Ok(Self::Pending),
			"PROCESSING" => Ok(Self::Processing),
			"COMPLETED" => Ok(Self::Completed),
			_ => Err(()),
		}
	}
}
