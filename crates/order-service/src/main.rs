//! Main entry point for the order pipeline service.
//!
//! Accepts orders over HTTP, processes them on a pool of concurrent workers
//! and keeps running metrics that survive restarts. Storage and the
//! per-order work step are pluggable and selected in the configuration.

use clap::Parser;
use order_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the order pipeline service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the order pipeline service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the engine and restores persisted metrics
/// 5. Runs the workers and the API until interrupted
/// 6. Stops the workers and flushes metrics
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order pipeline");

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config.clone())?);
	engine.initialize().await?;

	let api_config = config.api.clone().filter(|api| api.enabled);

	if let Some(api_config) = api_config {
		let api_engine = Arc::clone(&engine);

		tokio::select! {
			result = engine.run() => {
				tracing::info!("Pipeline finished");
				if let Err(e) = result {
					tracing::error!(error = %e, "Pipeline failed");
				}
			}
			result = server::start_server(api_config, api_engine) => {
				tracing::info!("API server finished");
				if let Err(e) = result {
					tracing::error!(error = %e, "API server failed");
				}
			}
		}
	} else {
		tracing::info!("Starting pipeline only");
		if let Err(e) = engine.run().await {
			tracing::error!(error = %e, "Pipeline failed");
		}
	}

	engine.shutdown().await?;
	tracing::info!("Stopped order pipeline");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_args_default_values() {
		let args = Args::parse_from(["order-pipeline"]);

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["order-pipeline", "-c", "custom.toml", "--log-level", "debug"]);

		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_sample_config_builds() {
		let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config.toml");
		let config = Config::from_file(path).await.expect("Failed to load sample config");

		assert_eq!(config.pipeline.workers, 4);
		assert_eq!(config.storage.primary, "file");
		assert!(config.api.as_ref().is_some_and(|api| api.enabled));

		let engine = factory_registry::build_engine_from_config(config)
			.expect("Failed to build engine");
		assert_eq!(engine.health().workers.len(), 0);
	}

	#[tokio::test]
	async fn test_build_engine_from_file_config() {
		let temp_dir = tempdir().expect("Failed to create temp dir");
		let config_path = temp_dir.path().join("test_config.toml");
		let storage_path = temp_dir.path().join("storage");

		let config_content = format!(
			r#"
[service]
id = "test-file-pipeline"

[storage]
primary = "file"

[storage.implementations.file]
storage_path = "{}"

[work]
primary = "random_delay"

[work.implementations.random_delay]
min_ms = 1
max_ms = 2

[pipeline]
workers = 3
"#,
			storage_path.display()
		);

		std::fs::write(&config_path, config_content).expect("Failed to write config");

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.expect("Failed to load config");
		assert_eq!(config.service.id, "test-file-pipeline");
		assert_eq!(config.pipeline.workers, 3);

		let engine = factory_registry::build_engine_from_config(config)
			.expect("Failed to build engine");
		engine.initialize().await.expect("Failed to restore metrics");
		assert_eq!(engine.metrics_snapshot().total_orders_processed, 0);
	}
}
