//! Error envelope for the HTTP surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sandlot_engine::LifecycleError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    Internal,
}

impl ErrorCode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }

    const fn status(self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    request_id: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope<'a> {
    request_id: &'a str,
    error: ErrorBody<'a>,
}

impl ApiError {
    pub fn bad_request(request_id: &str, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidArgument,
            message: message.into(),
            request_id: request_id.to_string(),
        }
    }

    pub fn from_lifecycle(request_id: &str, error: &LifecycleError) -> Self {
        let code = match error {
            LifecycleError::NotFound(_) => ErrorCode::NotFound,
            LifecycleError::Store(_) => ErrorCode::Internal,
            other if other.is_validation() => ErrorCode::InvalidArgument,
            _ => ErrorCode::Internal,
        };
        if code == ErrorCode::Internal {
            tracing::error!(request_id, error = %error, "Lifecycle request failed");
        }
        Self {
            code,
            message: error.to_string(),
            request_id: request_id.to_string(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            request_id: &self.request_id,
            error: ErrorBody {
                code: self.code.as_str(),
                message: &self.message,
            },
        };
        (self.code.status(), Json(body)).into_response()
    }
}
