//! Builder pattern for constructing pipeline engines.
//!
//! Composes a PipelineEngine from the storage and work implementations named
//! in the configuration, using factory functions supplied by the caller.

use crate::engine::PipelineEngine;
use order_config::Config;
use order_storage::{OrderStore, StorageError, StorageInterface, StorageService};
use order_work::{WorkError, WorkService, WorkStep};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during pipeline engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct PipelineFactories<SF, WF> {
	pub storage_factories: HashMap<String, SF>,
	pub work_factories: HashMap<String, WF>,
}

/// Builder for constructing a PipelineEngine with pluggable implementations.
pub struct PipelineBuilder {
	config: Config,
}

impl PipelineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine from the configured primary implementations.
	///
	/// Every configured implementation with a registered factory is created,
	/// so a broken secondary entry is reported even though only the primary
	/// is used.
	pub fn build<SF, WF>(
		self,
		factories: PipelineFactories<SF, WF>,
	) -> Result<PipelineEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		WF: Fn(&toml::Value) -> Result<Box<dyn WorkStep>, WorkError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "No factory registered, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					storage_impls.insert(name.clone(), implementation);
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::MissingComponent(format!("primary storage '{}'", primary_storage))
		})?;
		let store: Arc<dyn OrderStore> = Arc::new(StorageService::new(storage_backend));

		let mut work_impls = HashMap::new();
		for (name, config) in &self.config.work.implementations {
			let Some(factory) = factories.work_factories.get(name) else {
				tracing::warn!(component = "work", implementation = %name, "No factory registered, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => match implementation.config_schema().validate(config) {
					Ok(()) => {
						let is_primary = &self.config.work.primary == name;
						tracing::info!(component = "work", implementation = %name, enabled = %is_primary, "Loaded");
						work_impls.insert(name.clone(), implementation);
					},
					Err(e) => {
						tracing::error!(
							component = "work",
							implementation = %name,
							error = %e,
							"Invalid configuration for work implementation"
						);
						return Err(BuilderError::Config(format!(
							"Invalid configuration for work implementation '{}': {}",
							name, e
						)));
					},
				},
				Err(e) => {
					tracing::error!(
						component = "work",
						implementation = %name,
						error = %e,
						"Failed to create work implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create work implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary_work = &self.config.work.primary;
		let work_step = work_impls.remove(primary_work).ok_or_else(|| {
			BuilderError::MissingComponent(format!("primary work step '{}'", primary_work))
		})?;
		let work = Arc::new(WorkService::new(work_step));

		Ok(PipelineEngine::new(self.config, store, work))
	}
}
