//! Dynamic factory registry for pipeline implementations.
//!
//! Collects the factories every implementation crate exports so the engine
//! can be assembled from names in the configuration.

use order_config::Config;
use order_core::{PipelineBuilder, PipelineEngine, PipelineFactories};
use order_storage::StorageFactory;
use order_work::WorkFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub work: HashMap<String, WorkFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			work: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Register a work step implementation
	pub fn register_work(&mut self, name: impl Into<String>, factory: WorkFactory) {
		self.work.insert(name.into(), factory);
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry, populating it on first use
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in order_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in order_work::get_all_implementations() {
			tracing::debug!("Registering work implementation: {}", name);
			registry.register_work(name, factory);
		}

		registry
	})
}

/// Macro to build factories from config implementations
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Build the pipeline engine using the registry and config
pub fn build_engine_from_config(
	config: Config,
) -> Result<PipelineEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let work_factories = build_factories!(registry, config.work.implementations, work, "work");

	let factories = PipelineFactories {
		storage_factories,
		work_factories,
	};

	Ok(PipelineBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use order_config::ConfigBuilder;

	#[test]
	fn test_registry_contains_all_implementations() {
		let registry = get_registry();

		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("file"));
		assert!(registry.work.contains_key("random_delay"));
	}

	#[test]
	fn test_build_engine_from_config() {
		let config = ConfigBuilder::new().service_id("registry-test").build();

		let engine = build_engine_from_config(config).unwrap();
		assert_eq!(engine.config().service.id, "registry-test");
	}

	#[test]
	fn test_unknown_implementation_lists_available() {
		let mut config = ConfigBuilder::new().build();
		config
			.storage
			.implementations
			.insert("redis".to_string(), toml::Value::Table(toml::map::Map::new()));

		let err = build_engine_from_config(config).err().unwrap().to_string();
		assert_eq!(
			err,
			"Unknown storage implementation 'redis'. Available: [file, memory]"
		);
	}
}
