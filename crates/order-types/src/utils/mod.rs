//! Utility functions shared across the pipeline crates.

pub mod formatting;
pub mod helpers;

pub use formatting::truncate_id;
pub use helpers::{mean, round_to};
