//! Request and response types of the locate service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::algorithms::estimate::SolverKind;
use crate::algorithms::locator::Solution;
pub use crate::algorithms::locator::Method;
use crate::validation::error::{LocatorError, LocatorResult, SolveWarning};

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Request-level failures; per-record solve failures are reported inside the response
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is missing or is not valid JSON for a locate request (400)
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Unknown method selector (400)
    #[error("{0}")]
    InvalidMethod(String),

    /// Required field absent (400)
    #[error("Missing field '{0}'")]
    MissingField(String),

    /// Solver task failed to complete (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody(_) | ApiError::InvalidMethod(_) | ApiError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidBody(_) => "INVALID_BODY",
            ApiError::InvalidMethod(_) => "INVALID_METHOD",
            ApiError::MissingField(_) => "MISSING_FIELD",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Body of `POST /locate`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocateRequest {
    /// `1`, `2`, `"linear"` or `"nonlinear"`; defaults to linear
    #[serde(default)]
    pub method: Option<Value>,
    /// Receiver records, each `{"<station>": [x, y, t], ...}`
    #[serde(default)]
    pub measurements: Option<Vec<Value>>,
}

impl LocateRequest {
    pub fn method(&self) -> ApiResult<Method> {
        match &self.method {
            None | Some(Value::Null) => Ok(Method::default()),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|code| u8::try_from(code).ok())
                .ok_or_else(|| ApiError::InvalidMethod(format!("Invalid method {}: expected 1 or 2", n)))
                .and_then(|code| Method::try_from(code).map_err(ApiError::InvalidMethod)),
            Some(Value::String(s)) => s.parse().map_err(ApiError::InvalidMethod),
            Some(other) => Err(ApiError::InvalidMethod(format!(
                "Invalid method {}: expected 1, 2, linear or nonlinear",
                other
            ))),
        }
    }

    pub fn measurements(&self) -> ApiResult<&[Value]> {
        self.measurements
            .as_deref()
            .ok_or_else(|| ApiError::MissingField("measurements".to_string()))
    }
}

/// Per-record failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordError {
    pub kind: String,
    pub message: String,
}

impl From<&LocatorError> for RecordError {
    fn from(error: &LocatorError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// One entry of the response, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordResult {
    Located {
        x: f64,
        y: f64,
        solver: SolverKind,
        warnings: Vec<SolveWarning>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        converged: Option<bool>,
    },
    Failed {
        error: RecordError,
    },
}

impl From<&LocatorResult<Solution>> for RecordResult {
    fn from(result: &LocatorResult<Solution>) -> Self {
        match result {
            Ok(solution) => RecordResult::Located {
                x: solution.estimate.position.x,
                y: solution.estimate.position.y,
                solver: solution.estimate.solver,
                warnings: solution.estimate.warnings.clone(),
                converged: solution.converged,
            },
            Err(error) => RecordResult::Failed { error: error.into() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateResponse {
    pub method: u8,
    pub results: Vec<RecordResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::estimate::Estimate;
    use crate::core::Position;
    use serde_json::json;

    fn request(body: Value) -> LocateRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_method_selection() {
        assert_eq!(request(json!({})).method().unwrap(), Method::Linear);
        assert_eq!(request(json!({"method": 2})).method().unwrap(), Method::Nonlinear);
        assert_eq!(request(json!({"method": "linear"})).method().unwrap(), Method::Linear);

        for bad in [json!({"method": 3}), json!({"method": -1}), json!({"method": 1.5}), json!({"method": [1]})] {
            assert!(matches!(request(bad).method(), Err(ApiError::InvalidMethod(_))));
        }
    }

    #[test]
    fn test_missing_measurements() {
        let err = request(json!({"method": 1})).measurements().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "MISSING_FIELD");
    }

    #[test]
    fn test_record_result_serialization() {
        let solution = Solution {
            estimate: Estimate::new(Position::new(3.0, 4.0), SolverKind::Nonlinear),
            converged: Some(true),
        };
        let located: LocatorResult<Solution> = Ok(solution);
        let located = serde_json::to_value(RecordResult::from(&located)).unwrap();
        assert_eq!(located, json!({"x": 3.0, "y": 4.0, "solver": "nonlinear", "warnings": [], "converged": true}));

        let failed: LocatorResult<Solution> = Err(LocatorError::InsufficientReceivers { available: 2, required: 3 });
        let failed = serde_json::to_value(RecordResult::from(&failed)).unwrap();
        assert_eq!(failed["error"]["kind"], "insufficient_receivers");
    }

    #[test]
    fn test_linear_result_omits_converged() {
        let solution = Solution {
            estimate: Estimate::new(Position::new(1.0, 2.0), SolverKind::Exact),
            converged: None,
        };
        let result: LocatorResult<Solution> = Ok(solution);
        let value = serde_json::to_value(RecordResult::from(&result)).unwrap();
        assert!(value.get("converged").is_none());
        assert_eq!(value["solver"], "exact");
    }
}
