//! Storage-related types for the pipeline.

/// Storage namespaces for the different data collections.
///
/// Keys are formed as `namespace:id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order records keyed by order id.
	Orders,
	/// Metric records keyed by metric name.
	Metrics,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Metrics => "metrics",
		}
	}
}
