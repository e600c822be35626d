//! API types for the order pipeline HTTP API.
//!
//! This module defines the request and response bodies of the `/api`
//! endpoints and the structured error type the handlers return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::OrderStatus;

/// Response for a successfully admitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
	pub order_id: String,
	pub status: OrderStatus,
	pub message: String,
}

/// Request body for the load-test endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestRequest {
	/// Number of synthetic orders to create.
	#[serde(default = "default_num_orders")]
	pub num_orders: usize,
}

impl Default for LoadTestRequest {
	fn default() -> Self {
		Self {
			num_orders: default_num_orders(),
		}
	}
}

fn default_num_orders() -> usize {
	100
}

/// Response for a load-test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestResponse {
	pub message: String,
	pub order_ids: Vec<String>,
}

/// Observable state of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
	/// Waiting on the submission queue.
	Idle,
	/// Holding an order.
	Busy,
	/// Loop has exited.
	Stopped,
}

/// Liveness report for one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHealth {
	pub id: usize,
	pub state: WorkerState,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_order: Option<String>,
	/// Orders this worker drove to completion.
	pub processed: u64,
	/// Orders this worker gave up on after an error or panic.
	pub failures: u64,
	pub last_active: DateTime<Utc>,
}

/// Response for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	/// `ok` when every worker is alive, `degraded` otherwise.
	pub status: String,
	pub queue_depth: usize,
	pub outstanding: usize,
	pub workers: Vec<WorkerHealth>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Human-readable description
	pub error: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest { message: String },
	/// Unknown resource (404)
	NotFound { message: String },
	/// Resource already exists (409)
	Conflict { message: String },
	/// Internal server error (500). The cause is logged, never returned.
	InternalServerError,
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::InternalServerError => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let error = match self {
			APIError::BadRequest { message }
			| APIError::NotFound { message }
			| APIError::Conflict { message } => message.clone(),
			APIError::InternalServerError => "Internal server error".to_string(),
		};
		ErrorResponse {
			error,
			details: None,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message } => write!(f, "Conflict: {}", message),
			APIError::InternalServerError => write!(f, "Internal Server Error"),
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		(status, Json(self.to_error_response())).into_response()
	}
}
