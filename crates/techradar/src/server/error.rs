//! HTTP error responses.
//!
//! Every failure leaves the API as `{"detail": "<message>"}` with a status
//! derived from the crate error, or from axum's rejection for bodies that
//! could not be decoded.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message.
    pub detail: String,
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Status code of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Message carried in the `detail` field.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Conflict { .. } | Error::ConcurrentModification { .. } => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => {
                tracing::error!(error = %err, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // 422 for well-formed JSON of the wrong shape, 400 for malformed JSON
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_409() {
        let err = ApiError::from(Error::conflict("React"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.detail(), "Technology with the name 'React' already exists");
    }

    #[test]
    fn test_concurrent_modification_maps_to_409() {
        let err = ApiError::from(Error::ConcurrentModification {
            name: "React".to_string(),
            attempts: 5,
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = ApiError::from(Error::not_found("Ghost"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.detail(), "Technology with the name 'Ghost' does not exist");
    }

    #[test]
    fn test_invalid_input_maps_to_422() {
        let err = ApiError::from(Error::invalid_input("empty name"));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_internal_maps_to_500() {
        let err = ApiError::from(Error::internal("boom"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.detail().contains("boom"));
    }

    #[test]
    fn test_into_response_uses_status() {
        let response = ApiError::new(StatusCode::NOT_FOUND, "missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
