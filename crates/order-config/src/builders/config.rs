//! Configuration builder for creating test and development configurations.
//!
//! Produces a valid `Config` backed by in-memory storage and a short
//! random delay work step, so pipelines built from it run quickly.

use crate::{
	ApiConfig, Config, PipelineConfig, RetryConfig, ServiceConfig, StorageConfig, WorkConfig,
};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	work_min_ms: u64,
	work_max_ms: u64,
	pipeline: PipelineConfig,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			service_id: "test-pipeline".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::map::Map::new()),
			work_min_ms: 5,
			work_max_ms: 15,
			pipeline: PipelineConfig {
				dequeue_timeout_ms: 50,
				retry: RetryConfig {
					initial_interval_ms: 5,
					max_interval_ms: 20,
					max_elapsed_ms: 200,
				},
				..PipelineConfig::default()
			},
			api: None,
		}
	}

	/// Sets the service ID.
	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Uses file storage rooted at the given directory.
	pub fn file_storage(mut self, path: impl Into<String>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert("storage_path".to_string(), toml::Value::String(path.into()));
		self.storage_primary = "file".to_string();
		self.storage_config = toml::Value::Table(table);
		self
	}

	/// Sets the work step delay range in milliseconds.
	pub fn work_delay_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
		self.work_min_ms = min_ms;
		self.work_max_ms = max_ms;
		self
	}

	/// Sets the number of workers.
	pub fn workers(mut self, workers: usize) -> Self {
		self.pipeline.workers = workers;
		self
	}

	/// Sets the metrics flush cadence.
	pub fn flush_every(mut self, flush_every: u64) -> Self {
		self.pipeline.flush_every = flush_every;
		self
	}

	/// Sets the load-test bound.
	pub fn load_test_max(mut self, max: usize) -> Self {
		self.pipeline.load_test_max = max;
		self
	}

	/// Sets the dequeue timeout in milliseconds.
	pub fn dequeue_timeout_ms(mut self, timeout_ms: u64) -> Self {
		self.pipeline.dequeue_timeout_ms = timeout_ms;
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut work_table = toml::map::Map::new();
		work_table.insert(
			"min_ms".to_string(),
			toml::Value::Integer(self.work_min_ms as i64),
		);
		work_table.insert(
			"max_ms".to_string(),
			toml::Value::Integer(self.work_max_ms as i64),
		);

		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				implementations: HashMap::from([(
					self.storage_primary.clone(),
					self.storage_config,
				)]),
				primary: self.storage_primary,
			},
			work: WorkConfig {
				primary: "random_delay".to_string(),
				implementations: HashMap::from([(
					"random_delay".to_string(),
					toml::Value::Table(work_table),
				)]),
			},
			pipeline: self.pipeline,
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_is_valid() {
		let config = ConfigBuilder::new().workers(2).flush_every(3).build();
		assert!(config.validate().is_ok());
		assert_eq!(config.pipeline.workers, 2);
		assert_eq!(config.pipeline.flush_every, 3);
		assert!(config.storage.implementations.contains_key("memory"));
	}

	#[test]
	fn test_file_storage_switches_primary() {
		let config = ConfigBuilder::new().file_storage("/tmp/orders").build();
		assert_eq!(config.storage.primary, "file");
		assert_eq!(
			config.storage.implementations["file"]
				.get("storage_path")
				.and_then(|v| v.as_str()),
			Some("/tmp/orders")
		);
	}
}
