//! Order endpoints for the pipeline API.
//!
//! Submission bodies are parsed by hand from a raw JSON value rather than
//! through a typed extractor, so that each malformed field produces its own
//! error message.

use order_core::{EngineError, PipelineEngine};
use order_types::{APIError, CreateOrderResponse, NewOrder, Order, OrderStatus};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// Fields every submission must carry, checked in this order.
const REQUIRED_FIELDS: [&str; 3] = ["user_id", "item_ids", "total_amount"];

/// Errors that can occur while parsing an order submission.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderRequestError {
	#[error("Invalid JSON body")]
	InvalidJson,
	#[error("Request body must be a JSON object")]
	NotAnObject,
	#[error("Missing required field: {0}")]
	MissingField(&'static str),
	#[error("Invalid value for field: {0}")]
	InvalidField(&'static str),
}

impl From<OrderRequestError> for APIError {
	fn from(err: OrderRequestError) -> Self {
		APIError::BadRequest {
			message: err.to_string(),
		}
	}
}

/// Parses and validates a raw `POST /api/orders` body.
pub fn parse_new_order(body: &[u8]) -> Result<NewOrder, OrderRequestError> {
	let value: Value = serde_json::from_slice(body).map_err(|_| OrderRequestError::InvalidJson)?;
	let fields = value.as_object().ok_or(OrderRequestError::NotAnObject)?;

	if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !fields.contains_key(**f)) {
		return Err(OrderRequestError::MissingField(*missing));
	}

	let user_id = fields
		.get("user_id")
		.and_then(Value::as_str)
		.ok_or(OrderRequestError::InvalidField("user_id"))?
		.to_string();

	Ok(NewOrder {
		order_id: parse_order_id(fields)?,
		user_id,
		item_ids: parse_item_ids(fields)?,
		total_amount: parse_amount(fields)?,
	})
}

fn parse_order_id(fields: &Map<String, Value>) -> Result<Option<String>, OrderRequestError> {
	match fields.get("order_id") {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
		Some(_) => Err(OrderRequestError::InvalidField("order_id")),
	}
}

fn parse_item_ids(fields: &Map<String, Value>) -> Result<Vec<String>, OrderRequestError> {
	let invalid = OrderRequestError::InvalidField("item_ids");
	let items = fields
		.get("item_ids")
		.and_then(Value::as_array)
		.filter(|items| !items.is_empty())
		.ok_or(invalid.clone())?;

	items
		.iter()
		.map(|item| item.as_str().map(str::to_string).ok_or(invalid.clone()))
		.collect()
}

fn parse_amount(fields: &Map<String, Value>) -> Result<Decimal, OrderRequestError> {
	let invalid = OrderRequestError::InvalidField("total_amount");
	let Some(Value::Number(number)) = fields.get("total_amount") else {
		return Err(invalid);
	};

	let text = number.to_string();
	let amount = Decimal::from_str(&text)
		.or_else(|_| Decimal::from_scientific(&text))
		.map_err(|_| invalid.clone())?;

	if amount.is_sign_negative() && !amount.is_zero() {
		return Err(invalid);
	}
	Ok(amount.normalize())
}

/// Handles a parsed submission.
pub async fn create_order(
	engine: &PipelineEngine,
	new_order: NewOrder,
) -> Result<CreateOrderResponse, APIError> {
	match engine.submit(new_order).await {
		Ok(order) => Ok(CreateOrderResponse {
			order_id: order.order_id,
			status: OrderStatus::Pending,
			message: "Order received and queued for processing".to_string(),
		}),
		Err(EngineError::AlreadyExists(id)) => {
			tracing::warn!(order_id = %id, "Rejected duplicate order");
			Err(APIError::Conflict {
				message: "Order already exists".to_string(),
			})
		},
		Err(e) => {
			tracing::error!(error = %e, "Error creating order");
			Err(APIError::InternalServerError)
		},
	}
}

/// Looks up an order by id.
pub async fn get_order_by_id(engine: &PipelineEngine, order_id: &str) -> Result<Order, APIError> {
	match engine.get_order(order_id).await {
		Ok(Some(order)) => Ok(order),
		Ok(None) => Err(APIError::NotFound {
			message: "Order not found".to_string(),
		}),
		Err(e) => {
			tracing::error!(error = %e, "Error getting order status");
			Err(APIError::InternalServerError)
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn parse(value: Value) -> Result<NewOrder, OrderRequestError> {
		parse_new_order(value.to_string().as_bytes())
	}

	#[test]
	fn test_parse_valid_order() {
		let order = parse(json!({
			"user_id": "u1",
			"item_ids": ["i1", "i2"],
			"total_amount": 42.50
		}))
		.unwrap();

		assert_eq!(order.order_id, None);
		assert_eq!(order.user_id, "u1");
		assert_eq!(order.item_ids, vec!["i1", "i2"]);
		assert_eq!(order.total_amount, Decimal::new(425, 1));
	}

	#[test]
	fn test_caller_supplied_id_is_kept() {
		let order = parse(json!({
			"order_id": "abc-123",
			"user_id": "u1",
			"item_ids": ["i1"],
			"total_amount": 0
		}))
		.unwrap();

		assert_eq!(order.order_id.as_deref(), Some("abc-123"));
		assert!(order.total_amount.is_zero());
	}

	#[test]
	fn test_missing_fields_reported_in_order() {
		assert_eq!(
			parse(json!({})).unwrap_err(),
			OrderRequestError::MissingField("user_id")
		);
		assert_eq!(
			parse(json!({ "user_id": "u1", "total_amount": 1 })).unwrap_err(),
			OrderRequestError::MissingField("item_ids")
		);
		assert_eq!(
			parse(json!({ "user_id": "u1", "item_ids": ["i1"] })).unwrap_err(),
			OrderRequestError::MissingField("total_amount")
		);
	}

	#[test]
	fn test_invalid_values() {
		let base = || json!({ "user_id": "u1", "item_ids": ["i1"], "total_amount": 1.5 });
		let cases = [
			("user_id", json!(7)),
			("item_ids", json!([])),
			("item_ids", json!("i1")),
			("item_ids", json!(["i1", 2])),
			("total_amount", json!(-1)),
			("total_amount", json!("12.00")),
			("order_id", json!(42)),
			("order_id", json!("")),
		];

		for (field, bad) in cases {
			let mut body = base();
			body[field] = bad;
			let err = parse(body).unwrap_err();
			assert_eq!(err, OrderRequestError::InvalidField(field));
			assert_eq!(err.to_string(), format!("Invalid value for field: {}", field));
		}
	}

	#[test]
	fn test_malformed_bodies() {
		assert_eq!(
			parse_new_order(b"{not json").unwrap_err(),
			OrderRequestError::InvalidJson
		);
		assert_eq!(
			parse_new_order(b"").unwrap_err(),
			OrderRequestError::InvalidJson
		);
		assert_eq!(
			parse(json!(["u1"])).unwrap_err(),
			OrderRequestError::NotAnObject
		);
	}
}
