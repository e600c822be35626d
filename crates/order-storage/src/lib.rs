//! Storage module for the order pipeline.
//!
//! This module provides byte-level storage backends (in-memory and file-based),
//! a typed JSON service on top of them, and the `OrderStore` contract the
//! pipeline core persists orders and metrics through.

use async_trait::async_trait;
use chrono::Utc;
use order_types::{
	ConfigSchema, ImplementationRegistry, MetricName, MetricRecord, Order, OrderStatus,
	StorageKey,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when creating an item whose key is already taken.
	#[error("Already exists: {0}")]
	AlreadyExists(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Backends deal in raw bytes keyed by `namespace:id` strings.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, creating or overwriting the key.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Stores raw bytes only if the key is absent.
	///
	/// The check and the write are one atomic step: of several concurrent
	/// creates for the same key exactly one succeeds and the others fail
	/// with `AlreadyExists`.
	async fn create_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples used by the service to
/// populate its factory registry.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Persistence contract used by the pipeline core.
///
/// Orders live in the `orders` namespace keyed by order id. Metrics live in
/// the `metrics` namespace, one record per metric name.
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Persists a new order. Fails with `AlreadyExists` if the id is taken.
	async fn create_order(&self, order: &Order) -> Result<(), StorageError>;

	/// Looks up an order by id.
	async fn get_order(&self, order_id: &str) -> Result<Option<Order>, StorageError>;

	/// Sets the status and `updated_at` of an order.
	///
	/// Returns `false` when no order with this id exists.
	async fn update_order_status(
		&self,
		order_id: &str,
		status: OrderStatus,
	) -> Result<bool, StorageError>;

	/// Loads every persisted metric record.
	async fn load_metrics(&self) -> Result<Vec<MetricRecord>, StorageError>;

	/// Upserts the given metric records.
	async fn save_metrics(&self, records: &[MetricRecord]) -> Result<(), StorageError>;
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and serializes
/// values to JSON on the way in and out.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	/// Stores a serializable value under a new id.
	///
	/// Fails with `AlreadyExists` when the id is taken, including when a
	/// concurrent create for the same id wins the race.
	pub async fn create<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.create_bytes(&Self::key(namespace, id), bytes)
			.await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	/// Updates an existing value in storage.
	///
	/// Unlike `store`, this fails with `NotFound` when the key is absent.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = Self::key(namespace, id);
		if !self.backend.exists(&key).await? {
			return Err(StorageError::NotFound);
		}

		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}
}

#[async_trait]
impl OrderStore for StorageService {
	async fn create_order(&self, order: &Order) -> Result<(), StorageError> {
		match self
			.create(StorageKey::Orders.as_str(), &order.order_id, order)
			.await
		{
			Err(StorageError::AlreadyExists(_)) => {
				Err(StorageError::AlreadyExists(order.order_id.clone()))
			},
			other => other,
		}
	}

	async fn get_order(&self, order_id: &str) -> Result<Option<Order>, StorageError> {
		match self.retrieve(StorageKey::Orders.as_str(), order_id).await {
			Ok(order) => Ok(Some(order)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	async fn update_order_status(
		&self,
		order_id: &str,
		status: OrderStatus,
	) -> Result<bool, StorageError> {
		let namespace = StorageKey::Orders.as_str();
		let mut order: Order = match self.retrieve(namespace, order_id).await {
			Ok(order) => order,
			Err(StorageError::NotFound) => return Ok(false),
			Err(e) => return Err(e),
		};

		order.status = status;
		order.updated_at = Utc::now();

		match self.update(namespace, order_id, &order).await {
			Ok(()) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn load_metrics(&self) -> Result<Vec<MetricRecord>, StorageError> {
		let namespace = StorageKey::Metrics.as_str();
		let mut records = Vec::new();

		for name in MetricName::all() {
			match self.retrieve::<MetricRecord>(namespace, &name.key()).await {
				Ok(record) => records.push(record),
				Err(StorageError::NotFound) => continue,
				Err(StorageError::Serialization(e)) => {
					tracing::warn!(
						metric = %name,
						error = %e,
						"Skipping unreadable metric record"
					);
				},
				Err(e) => return Err(e),
			}
		}

		Ok(records)
	}

	async fn save_metrics(&self, records: &[MetricRecord]) -> Result<(), StorageError> {
		let namespace = StorageKey::Metrics.as_str();
		for record in records {
			self.store(namespace, &record.metric_name, record).await?;
		}
		tracing::debug!(count = records.len(), "Saved metric records");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use order_types::NewOrder;
	use rust_decimal::Decimal;

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	fn order(id: &str) -> Order {
		Order::pending(NewOrder {
			order_id: Some(id.to_string()),
			user_id: "u1".to_string(),
			item_ids: vec!["i1".to_string()],
			total_amount: Decimal::new(4250, 2),
		})
	}

	#[tokio::test]
	async fn test_create_and_get_order() {
		let store = service();
		let order = order("order-1");
		store.create_order(&order).await.unwrap();

		let loaded = store.get_order("order-1").await.unwrap().unwrap();
		assert_eq!(loaded, order);
		assert!(store.get_order("missing").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_create_duplicate_rejected() {
		let store = service();
		store.create_order(&order("dup")).await.unwrap();

		let result = store.create_order(&order("dup")).await;
		assert!(matches!(result, Err(StorageError::AlreadyExists(id)) if id == "dup"));
	}

	#[tokio::test]
	async fn test_concurrent_creates_admit_one() {
		let store = std::sync::Arc::new(service());

		let handles: Vec<_> = (0..16)
			.map(|_| {
				let store = store.clone();
				tokio::spawn(async move { store.create_order(&order("race")).await })
			})
			.collect();

		let mut created = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(()) => created += 1,
				Err(StorageError::AlreadyExists(id)) => assert_eq!(id, "race"),
				Err(e) => panic!("unexpected error: {}", e),
			}
		}
		assert_eq!(created, 1);
	}

	#[tokio::test]
	async fn test_update_order_status() {
		let store = service();
		let original = order("order-2");
		store.create_order(&original).await.unwrap();

		assert!(store
			.update_order_status("order-2", OrderStatus::Processing)
			.await
			.unwrap());
		let loaded = store.get_order("order-2").await.unwrap().unwrap();
		assert_eq!(loaded.status, OrderStatus::Processing);
		assert!(loaded.updated_at >= original.updated_at);
		assert_eq!(loaded.created_at, original.created_at);

		assert!(!store
			.update_order_status("missing", OrderStatus::Completed)
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn test_metrics_round_trip() {
		let store = service();
		assert!(store.load_metrics().await.unwrap().is_empty());

		let now = Utc::now();
		let records = vec![
			MetricRecord::new(MetricName::TotalOrdersProcessed, 12, now),
			MetricRecord::new(MetricName::StatusCount(OrderStatus::Completed), 12, now),
		];
		store.save_metrics(&records).await.unwrap();

		let mut loaded = store.load_metrics().await.unwrap();
		loaded.sort_by(|a, b| a.metric_name.cmp(&b.metric_name));
		assert_eq!(loaded.len(), 2);
		assert_eq!(loaded[0].metric_name, "status_count_COMPLETED");
		assert_eq!(loaded[1].metric_name, "total_orders_processed");
		assert_eq!(loaded[1].metric_value, "12");
	}

	#[tokio::test]
	async fn test_update_requires_existing_key() {
		let store = service();
		let result = store.update("orders", "nope", &"value").await;
		assert!(matches!(result, Err(StorageError::NotFound)));

		store.store("orders", "yes", &"v1").await.unwrap();
		store.update("orders", "yes", &"v2").await.unwrap();
		let value: String = store.retrieve("orders", "yes").await.unwrap();
		assert_eq!(value, "v2");

		store.remove("orders", "yes").await.unwrap();
		assert!(!store.exists("orders", "yes").await.unwrap());
	}
}
