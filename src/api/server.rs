//! HTTP locate service

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::algorithms::locator::TdoaLocator;
use crate::api::types::{ApiError, ApiResult, LocateRequest, LocateResponse, RecordResult};
use crate::processing::batch::BatchProcessor;
use crate::processing::parser::{MeasurementParser, ParsedRecord};
use crate::utils::config::LocatorConfig;

/// Shared, read-only handler state
#[derive(Clone)]
pub struct AppState {
    locator: Arc<TdoaLocator>,
    parser: Arc<MeasurementParser>,
}

impl AppState {
    pub fn new(config: &LocatorConfig) -> Self {
        Self {
            locator: Arc::new(config.solver.clone()),
            parser: Arc::new(MeasurementParser::from_config(&config.input)),
        }
    }
}

/// Router with the locate endpoint at `server.api_endpoint`
pub fn router(config: &LocatorConfig) -> Router {
    Router::new()
        .route(&config.server.api_endpoint, post(locate))
        .route("/health", get(health))
        .with_state(AppState::new(config))
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: LocatorConfig) -> std::io::Result<()> {
    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, endpoint = %config.server.api_endpoint, "locate service listening");

    axum::serve(listener, router(&config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("locate service stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn locate(
    State(state): State<AppState>,
    payload: Result<Json<LocateRequest>, JsonRejection>,
) -> ApiResult<Json<LocateResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let method = request.method()?;
    let records: Vec<ParsedRecord> = request
        .measurements()?
        .iter()
        .map(|record| state.parser.parse_record(record))
        .collect();

    let locator = TdoaLocator::clone(&state.locator);
    let items = tokio::task::spawn_blocking(move || BatchProcessor::new(locator, method).process_records(&records))
        .await
        .map_err(|e| ApiError::Internal(format!("solver task failed: {}", e)))?;

    Ok(Json(LocateResponse {
        method: method.code(),
        results: items.iter().map(|item| RecordResult::from(&item.result)).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};

    fn state() -> AppState {
        AppState::new(&LocatorConfig::default())
    }

    fn body(value: Value) -> Result<Json<LocateRequest>, JsonRejection> {
        Ok(Json(serde_json::from_value(value).unwrap()))
    }

    async fn into_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn measurements() -> Value {
        json!([
            {"gnb1": [0.0, 0.0, 5.0], "gnb2": [3.0, 1.0, 3.0], "gnb3": [0.0, 3.0, 3.1622776601683795],
             "gnb4": [6.0, 4.0, 3.0], "gnb5": [3.0, 14.0, 10.0]},
            {"gnb1": [0.0, 0.0, 5.0], "gnb2": [3.0, 1.0]},
            {"gnb1": [0.0, 0.0, 5.0], "gnb2": [3.0, 1.0, 3.0], "gnb3": [0.0, 3.0, 3.1622776601683795]}
        ])
    }

    #[tokio::test]
    async fn test_locate_per_record_results() {
        let response = locate(State(state()), body(json!({"method": 2, "measurements": measurements()})))
            .await
            .into_response();
        let (status, value) = into_json(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["method"], 2);
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);

        assert_eq!(results[0]["converged"], true);
        assert!((results[0]["x"].as_f64().unwrap() - 3.0).abs() < 1e-5);
        assert!((results[0]["y"].as_f64().unwrap() - 4.0).abs() < 1e-5);
        assert_eq!(results[1]["error"]["kind"], "malformed_measurement");
        assert!((results[2]["x"].as_f64().unwrap() - 3.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_linear_is_default() {
        let response = locate(State(state()), body(json!({"measurements": measurements()})))
            .await
            .into_response();
        let (status, value) = into_json(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["method"], 1);
        assert_eq!(value["results"][0]["solver"], "linear");
        assert_eq!(value["results"][2]["solver"], "exact");
        assert!(value["results"][0].get("converged").is_none());
    }

    #[tokio::test]
    async fn test_invalid_method_is_bad_request() {
        let response = locate(State(state()), body(json!({"method": 7, "measurements": []})))
            .await
            .into_response();
        let (status, value) = into_json(response).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["code"], "INVALID_METHOD");
    }

    #[tokio::test]
    async fn test_missing_measurements_is_bad_request() {
        let response = locate(State(state()), body(json!({"method": 1})))
            .await
            .into_response();
        let (status, value) = into_json(response).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["code"], "MISSING_FIELD");
    }

    #[tokio::test]
    async fn test_health() {
        let Json(value) = health().await;
        assert_eq!(value["status"], "ok");
    }

    #[test]
    fn test_router_uses_configured_endpoint() {
        let mut config = LocatorConfig::default();
        config.server.api_endpoint = "/v1/locate".to_string();
        // route registration panics on malformed paths
        let _ = router(&config);
    }
}
