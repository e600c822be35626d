//! Configuration module for the order pipeline.
//!
//! This module provides structures and utilities for managing pipeline configuration.
//! It supports loading configuration from TOML files and validates every section
//! before the pipeline is built.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub use builders::config::ConfigBuilder;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, the full input dump is noise in logs
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the order pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the work step run on each order.
	pub work: WorkConfig,
	/// Worker pool, queue and metrics settings.
	#[serde(default)]
	pub pipeline: PipelineConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the pluggable work step.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkConfig {
	/// Which work implementation to run.
	pub primary: String,
	/// Map of work implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Worker pool and metrics cadence settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
	/// Number of concurrent workers draining the queue.
	#[serde(default = "default_workers")]
	pub workers: usize,
	/// How long a worker waits on an empty queue before looping.
	#[serde(default = "default_dequeue_timeout_ms")]
	pub dequeue_timeout_ms: u64,
	/// Metrics are flushed every time the processed total reaches a multiple of this.
	#[serde(default = "default_flush_every")]
	pub flush_every: u64,
	/// Upper bound on orders created by a single load-test call.
	#[serde(default = "default_load_test_max")]
	pub load_test_max: usize,
	/// Backoff applied to failed status updates.
	#[serde(default)]
	pub retry: RetryConfig,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			workers: default_workers(),
			dequeue_timeout_ms: default_dequeue_timeout_ms(),
			flush_every: default_flush_every(),
			load_test_max: default_load_test_max(),
			retry: RetryConfig::default(),
		}
	}
}

impl PipelineConfig {
	/// Dequeue timeout as a duration.
	pub fn dequeue_timeout(&self) -> Duration {
		Duration::from_millis(self.dequeue_timeout_ms)
	}
}

fn default_workers() -> usize {
	4
}

fn default_dequeue_timeout_ms() -> u64 {
	1000
}

fn default_flush_every() -> u64 {
	10
}

fn default_load_test_max() -> usize {
	1000
}

/// Exponential backoff bounds for storage status updates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
	#[serde(default = "default_initial_interval_ms")]
	pub initial_interval_ms: u64,
	#[serde(default = "default_max_interval_ms")]
	pub max_interval_ms: u64,
	/// Total time spent retrying one update before giving up.
	#[serde(default = "default_max_elapsed_ms")]
	pub max_elapsed_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			initial_interval_ms: default_initial_interval_ms(),
			max_interval_ms: default_max_interval_ms(),
			max_elapsed_ms: default_max_elapsed_ms(),
		}
	}
}

fn default_initial_interval_ms() -> u64 {
	50
}

fn default_max_interval_ms() -> u64 {
	1000
}

fn default_max_elapsed_ms() -> u64 {
	5000
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration. Permissive when absent.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
}

/// Returns the default API host.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	3000
}

/// Returns the default API timeout in seconds.
fn default_api_timeout() -> u64 {
	30
}

/// Returns the default maximum request size in bytes (1MB).
fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// Checks that:
	/// - the service id is not empty
	/// - the primary storage and work implementations are configured
	/// - pipeline values are within their accepted ranges
	/// - the API section, when enabled, has a usable port
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		// Storage
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		// Work
		if !self.work.implementations.contains_key(&self.work.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary work implementation '{}' not found in implementations",
				self.work.primary
			)));
		}

		// Pipeline
		let pipeline = &self.pipeline;
		if pipeline.workers == 0 || pipeline.workers > 256 {
			return Err(ConfigError::Validation(
				"pipeline.workers must be between 1 and 256".into(),
			));
		}
		if pipeline.dequeue_timeout_ms == 0 {
			return Err(ConfigError::Validation(
				"pipeline.dequeue_timeout_ms must be greater than 0".into(),
			));
		}
		if pipeline.flush_every == 0 {
			return Err(ConfigError::Validation(
				"pipeline.flush_every must be greater than 0".into(),
			));
		}
		if pipeline.load_test_max == 0 {
			return Err(ConfigError::Validation(
				"pipeline.load_test_max must be greater than 0".into(),
			));
		}
		if pipeline.retry.initial_interval_ms > pipeline.retry.max_interval_ms {
			return Err(ConfigError::Validation(
				"pipeline.retry.initial_interval_ms cannot exceed max_interval_ms".into(),
			));
		}

		if let Some(ref api) = self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation(
					"API port must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses and validates configuration from a TOML string.
///
/// Environment variables are resolved before parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
