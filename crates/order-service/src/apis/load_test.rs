//! Load-test endpoint creating synthetic orders.

use order_core::{EngineError, PipelineEngine};
use order_types::{APIError, LoadTestRequest, LoadTestResponse};
use serde_json::Value;

/// Parses a load-test body. An empty body asks for the default count.
pub fn parse_load_test_request(body: &[u8]) -> Result<LoadTestRequest, APIError> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(LoadTestRequest::default());
	}

	let value: Value = serde_json::from_slice(body).map_err(|_| APIError::BadRequest {
		message: "Invalid JSON body".to_string(),
	})?;

	match value {
		Value::Null => Ok(LoadTestRequest::default()),
		Value::Object(_) => serde_json::from_value(value).map_err(|_| APIError::BadRequest {
			message: "Invalid value for field: num_orders".to_string(),
		}),
		_ => Err(APIError::BadRequest {
			message: "Request body must be a JSON object".to_string(),
		}),
	}
}

/// Runs a load test through the normal submission path.
pub async fn run_load_test(
	engine: &PipelineEngine,
	request: LoadTestRequest,
) -> Result<LoadTestResponse, APIError> {
	match engine.submit_load_test(request.num_orders).await {
		Ok(order_ids) => Ok(LoadTestResponse {
			message: format!("Created {} test orders", order_ids.len()),
			order_ids,
		}),
		Err(EngineError::LoadTestTooLarge { max, .. }) => Err(APIError::BadRequest {
			message: format!("Maximum {} orders allowed for load test", max),
		}),
		Err(e) => {
			tracing::error!(error = %e, "Error in load test");
			Err(APIError::InternalServerError)
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bad_request_message(result: Result<LoadTestRequest, APIError>) -> String {
		match result {
			Err(APIError::BadRequest { message }) => message,
			other => panic!("expected a bad request, got {:?}", other),
		}
	}

	#[test]
	fn test_empty_body_uses_default() {
		assert_eq!(parse_load_test_request(b"").unwrap().num_orders, 100);
		assert_eq!(parse_load_test_request(b"  \n").unwrap().num_orders, 100);
		assert_eq!(parse_load_test_request(b"{}").unwrap().num_orders, 100);
		assert_eq!(parse_load_test_request(b"null").unwrap().num_orders, 100);
	}

	#[test]
	fn test_explicit_count() {
		let request = parse_load_test_request(br#"{"num_orders": 25}"#).unwrap();
		assert_eq!(request.num_orders, 25);
	}

	#[test]
	fn test_bad_bodies() {
		assert_eq!(
			bad_request_message(parse_load_test_request(b"{oops")),
			"Invalid JSON body"
		);
		assert_eq!(
			bad_request_message(parse_load_test_request(br#"{"num_orders": -5}"#)),
			"Invalid value for field: num_orders"
		);
		assert_eq!(
			bad_request_message(parse_load_test_request(b"[1]")),
			"Request body must be a JSON object"
		);
	}
}
