//! Common types module for the order pipeline.
//!
//! This module defines the data types shared by every pipeline component:
//! orders and their lifecycle status, metric records, storage namespaces,
//! HTTP request/response shapes and configuration validation helpers.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Metric names, persisted metric records and reporting snapshots.
pub mod metrics;
/// Order types including the lifecycle status.
pub mod order;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Storage namespaces for persisted data.
pub mod storage;
/// Utility functions for formatting and rounding.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use metrics::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{mean, round_to, truncate_id};
pub use validation::*;
