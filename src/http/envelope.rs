//! The JSON response envelope and the error taxonomy mapped onto it.
//!
//! Every route answers with `{"status": .., "message"?: .., "data"?: ..}`;
//! the transport status code is the envelope's `status`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{RepositoryError, StoreError};

/// Message used for every 404.
pub const NOT_FOUND_MESSAGE: &str = "Resource not found";

/// Uniform response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            message: None,
            data: None,
        }
    }

    /// 200 carrying `data`.
    pub fn ok(data: impl Serialize) -> Self {
        Self::new(StatusCode::OK).with_data(data)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND).with_message(NOT_FOUND_MESSAGE)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = Some(match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "Envelope data is not representable as JSON");
                Value::Null
            }
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Errors a handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    /// The relay could not complete its outbound call.
    #[error("{0}")]
    Upstream(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Failed to persist tasks")]
    Storage(#[source] StoreError),

    #[error("No task ids left to assign")]
    IdsExhausted,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) | ApiError::Storage(_) | ApiError::IdsExhausted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => ApiError::NotFound,
            RepositoryError::InvalidFields(e) => ApiError::BadRequest(format!("Invalid task fields: {}", e)),
            RepositoryError::Store(e) => ApiError::Storage(e),
            RepositoryError::IdsExhausted => ApiError::IdsExhausted,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Envelope::new(self.status_code())
            .with_message(self.to_string())
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optional_fields_are_omitted() {
        let env = Envelope::new(StatusCode::OK).with_message("Task deleted successfully");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"status": 200, "message": "Task deleted successfully"})
        );
        assert_eq!(
            serde_json::to_value(Envelope::not_found()).unwrap(),
            json!({"status": 404, "message": "Resource not found"})
        );
    }

    #[test]
    fn test_null_data_is_kept() {
        let env = Envelope::ok(Value::Null);
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"status": 200, "data": null})
        );
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Upstream("dns".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(RepositoryError::NotFound(3)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RepositoryError::IdsExhausted).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_status_follows_envelope() {
        let response = Envelope::new(StatusCode::CREATED).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }
}
