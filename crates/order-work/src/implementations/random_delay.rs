//! Work step that sleeps for a random duration.
//!
//! Stands in for real fulfilment work. Each call draws a delay uniformly from
//! `[min_ms, max_ms]` and sleeps for it.

use crate::{WorkError, WorkFactory, WorkRegistry, WorkStep};
use async_trait::async_trait;
use order_types::{
	truncate_id, ConfigSchema, Field, FieldType, ImplementationRegistry, Order, Schema,
	ValidationError,
};
use rand::Rng;
use std::time::Duration;

const DEFAULT_MIN_MS: u64 = 1000;
const DEFAULT_MAX_MS: u64 = 3000;

/// Random delay work step.
#[derive(Debug, Clone)]
pub struct RandomDelayWork {
	min_ms: u64,
	max_ms: u64,
}

impl RandomDelayWork {
	/// Creates a new step drawing delays from `[min_ms, max_ms]`.
	pub fn new(min_ms: u64, max_ms: u64) -> Result<Self, WorkError> {
		if min_ms > max_ms {
			return Err(WorkError::InvalidConfig(format!(
				"min_ms ({}) must not exceed max_ms ({})",
				min_ms, max_ms
			)));
		}
		Ok(Self { min_ms, max_ms })
	}

	fn next_delay(&self) -> Duration {
		let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
		Duration::from_millis(ms)
	}
}

/// Configuration schema for RandomDelayWork.
pub struct RandomDelaySchema;

impl ConfigSchema for RandomDelaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let delay_field = |name: &str| {
			Field::new(
				name,
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)
		};
		Schema::new(vec![], vec![delay_field("min_ms"), delay_field("max_ms")]).validate(config)?;

		let (min_ms, max_ms) = delay_bounds(config);
		if min_ms > max_ms {
			return Err(ValidationError::InvalidValue {
				field: "min_ms".to_string(),
				message: format!("must not exceed max_ms ({})", max_ms),
			});
		}
		Ok(())
	}
}

#[async_trait]
impl WorkStep for RandomDelayWork {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RandomDelaySchema)
	}

	async fn perform(&self, order: &Order) -> Result<(), WorkError> {
		let delay = self.next_delay();
		tracing::trace!(
			order_id = %truncate_id(&order.order_id),
			delay_ms = delay.as_millis() as u64,
			"Sleeping"
		);
		tokio::time::sleep(delay).await;
		Ok(())
	}
}

fn delay_bounds(config: &toml::Value) -> (u64, u64) {
	let read = |key: &str, default: u64| {
		config
			.get(key)
			.and_then(|v| v.as_integer())
			.and_then(|v| u64::try_from(v).ok())
			.unwrap_or(default)
	};
	(read("min_ms", DEFAULT_MIN_MS), read("max_ms", DEFAULT_MAX_MS))
}

/// Factory function to create a random delay work step from configuration.
///
/// Configuration parameters:
/// - `min_ms`: Lower delay bound in milliseconds (default: 1000)
/// - `max_ms`: Upper delay bound in milliseconds (default: 3000)
pub fn create_work_step(config: &toml::Value) -> Result<Box<dyn WorkStep>, WorkError> {
	RandomDelaySchema
		.validate(config)
		.map_err(|e| WorkError::InvalidConfig(e.to_string()))?;

	let (min_ms, max_ms) = delay_bounds(config);
	Ok(Box::new(RandomDelayWork::new(min_ms, max_ms)?))
}

/// Registry for the random delay work step.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "random_delay";
	type Factory = WorkFactory;

	fn factory() -> Self::Factory {
		create_work_step
	}
}

impl WorkRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = toml::Value::Table(toml::map::Map::new());
		assert_eq!(delay_bounds(&config), (1000, 3000));
		assert!(RandomDelaySchema.validate(&config).is_ok());
	}

	#[test]
	fn test_inverted_bounds_rejected() {
		let config: toml::Value = toml::from_str("min_ms = 50\nmax_ms = 10").unwrap();
		assert!(RandomDelaySchema.validate(&config).is_err());
		assert!(matches!(
			create_work_step(&config),
			Err(WorkError::InvalidConfig(_))
		));
		assert!(RandomDelayWork::new(2, 1).is_err());
	}

	#[test]
	fn test_negative_bound_rejected() {
		let config: toml::Value = toml::from_str("min_ms = -5").unwrap();
		assert!(create_work_step(&config).is_err());
	}

	#[test]
	fn test_delay_within_bounds() {
		let work = RandomDelayWork::new(10, 30).unwrap();
		for _ in 0..100 {
			let delay = work.next_delay();
			assert!(delay >= Duration::from_millis(10));
			assert!(delay <= Duration::from_millis(30));
		}
	}

	#[test]
	fn test_equal_bounds_are_fixed() {
		let work = RandomDelayWork::new(7, 7).unwrap();
		assert_eq!(work.next_delay(), Duration::from_millis(7));
	}
}
