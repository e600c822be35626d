//! Handlers for the work the pipeline performs on each order.

pub mod order;

pub use order::{HandlerError, OrderHandler};
