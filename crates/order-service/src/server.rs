//! HTTP server for the order pipeline API.
//!
//! Exposes order submission and lookup, the metrics aggregate, the load-test
//! generator and a health report under the `/api` base path.

use crate::apis;
use axum::{
	body::Bytes,
	extract::{Path, State},
	http::{HeaderValue, StatusCode},
	response::Json,
	routing::{get, post},
	Router,
};
use order_config::ApiConfig;
use order_core::PipelineEngine;
use order_types::{
	APIError, CreateOrderResponse, HealthResponse, LoadTestResponse, MetricsSnapshot, Order,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
	cors::{Any, CorsLayer},
	limit::RequestBodyLimitLayer,
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the pipeline engine for processing requests.
	pub engine: Arc<PipelineEngine>,
}

/// Builds the API router with its middleware stack.
pub fn router(engine: Arc<PipelineEngine>, api_config: &ApiConfig) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_create_order))
				.route("/orders/{id}", get(handle_get_order_by_id))
				.route("/metrics", get(handle_metrics))
				.route("/load-test", post(handle_load_test))
				.route("/health", get(handle_health)),
		)
		// Layers are applied innermost-first so each one sees axum's `Body`.
		.layer(RequestBodyLimitLayer::new(api_config.max_request_size))
		.layer(cors_layer(api_config))
		.layer(TimeoutLayer::with_status_code(
			StatusCode::REQUEST_TIMEOUT,
			Duration::from_secs(api_config.timeout_seconds),
		))
		.layer(TraceLayer::new_for_http())
		.with_state(AppState { engine })
}

fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let Some(cors) = &api_config.cors else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse::<HeaderValue>() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(Any)
		.allow_headers(Any)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<PipelineEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order pipeline API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<(StatusCode, Json<CreateOrderResponse>), APIError> {
	let new_order = apis::order::parse_new_order(&body).map_err(|e| {
		tracing::warn!(error = %e, "Rejected order submission");
		APIError::from(e)
	})?;

	let response = apis::order::create_order(&state.engine, new_order).await?;
	Ok((StatusCode::CREATED, Json(response)))
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order_by_id(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Order>, APIError> {
	apis::order::get_order_by_id(&state.engine, &id).await.map(Json)
}

/// Handles GET /api/metrics requests.
async fn handle_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
	Json(apis::metrics::get_metrics(&state.engine))
}

/// Handles POST /api/load-test requests.
async fn handle_load_test(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<(StatusCode, Json<LoadTestResponse>), APIError> {
	let request = apis::load_test::parse_load_test_request(&body)?;
	let response = apis::load_test::run_load_test(&state.engine, request).await?;
	Ok((StatusCode::CREATED, Json(response)))
}

/// Handles GET /api/health requests.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(apis::health::get_health(&state.engine))
}
