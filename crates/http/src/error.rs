//! Error handling for the turfbook HTTP layer

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

/// Standard error response format for all HTTP errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub details: Vec<serde_json::Value>,
    pub message: String,
    pub code: String,
    pub trace_id: String,
    pub timestamp: String,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("conflict: {message}")]
    Conflict {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create a conflict error carrying a domain-specific code
    pub fn conflict(
        code: impl Into<String>,
        details: Vec<serde_json::Value>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            details,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
        }
    }

    /// Replace the machine-readable code of a client error
    pub fn with_code(mut self, new_code: impl Into<String>) -> Self {
        match &mut self {
            AppError::Validation { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::BadRequest { code, .. } => *code = new_code.into(),
            AppError::Internal(_) => {}
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            // Booking clients receive every rejection, collisions included, as 400.
            AppError::Validation { .. } | AppError::Conflict { .. } | AppError::BadRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(
            vec![json!({"field": "body", "error": rejection.body_text()})],
            "request body is not valid",
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let status = self.status();

        let (error_code, message, details) = match self {
            AppError::Validation {
                details,
                code,
                message,
            }
            | AppError::Conflict {
                details,
                code,
                message,
            } => (code, message, details),
            AppError::NotFound { message, code } | AppError::BadRequest { message, code } => {
                (code, message, Vec::new())
            }
            AppError::Internal(e) => {
                tracing::error!(error_id = %error_id, error = ?e, "internal error");
                ("internal_error".to_string(), e.to_string(), Vec::new())
            }
        };

        tracing::error!(
            error_id = %error_id,
            error_code = %error_code,
            status_code = %status.as_u16(),
            "Request error"
        );

        // Release builds never leak internal error details
        let message = if cfg!(not(debug_assertions)) && status == StatusCode::INTERNAL_SERVER_ERROR
        {
            "An internal server error occurred".to_string()
        } else {
            message
        };

        let body = ErrorBody {
            details,
            message,
            code: error_code,
            trace_id: error_id.to_string(),
            timestamp,
        };

        (status, Json(json!({ "error": body }))).into_response()
    }
}
