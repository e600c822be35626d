//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Every pluggable module (storage backends, work steps) exposes a `Registry`
/// struct implementing this trait, tying the name used in configuration to
/// the factory that builds the implementation.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// for example `memory` in `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
