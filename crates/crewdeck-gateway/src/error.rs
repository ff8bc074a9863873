use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crewdeck_core::CrewdeckError;
use serde_json::json;

/// Wrapper that maps [`CrewdeckError`] onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub CrewdeckError);

/// Convenience alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<CrewdeckError> for ApiError {
    fn from(e: CrewdeckError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            CrewdeckError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            CrewdeckError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CrewdeckError::StateConflict(_) => (StatusCode::CONFLICT, "STATE_CONFLICT"),
            CrewdeckError::Launcher(_) => (StatusCode::BAD_GATEWAY, "LAUNCHER_ERROR"),
            CrewdeckError::Config(_)
            | CrewdeckError::Json(_)
            | CrewdeckError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let body = json!({
            "error": {
                "code": code,
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CrewdeckError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CrewdeckError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CrewdeckError::StateConflict("x".into()), StatusCode::CONFLICT),
            (CrewdeckError::Launcher("x".into()), StatusCode::BAD_GATEWAY),
            (
                CrewdeckError::Config("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            let response = ApiError(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
