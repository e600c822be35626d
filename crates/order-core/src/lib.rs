//! Core engine for the order processing pipeline.
//!
//! Accepts orders, queues them for a pool of concurrent workers, drives each
//! one through its status lifecycle and keeps an aggregate of pipeline
//! metrics that survives restarts. Storage and the per-order work step are
//! pluggable and wired up by [`PipelineBuilder`].

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod metrics;
pub mod queue;
pub mod state;

pub use builder::{BuilderError, PipelineBuilder, PipelineFactories};
pub use engine::{workers::WorkerPool, EngineError, PipelineEngine};
pub use handlers::{HandlerError, OrderHandler};
pub use metrics::MetricsAggregate;
pub use queue::{OrderQueue, QueueError};
pub use state::{OrderStateError, OrderStateMachine};
