//! State management for orders in the pipeline.
//!
//! Provides the state machine that validates status transitions and
//! persists them through the order store.

pub mod order;

pub use order::{OrderStateError, OrderStateMachine};
