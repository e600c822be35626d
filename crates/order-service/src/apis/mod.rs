//! Endpoint implementations for the pipeline API.

pub mod health;
pub mod load_test;
pub mod metrics;
pub mod order;
