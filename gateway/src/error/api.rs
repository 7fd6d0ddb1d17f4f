use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::provider::ProviderError;
use crate::types::function::InvalidFunctionName;

/// Top-level error kinds for the invocation path and the system routes.
/// Each variant knows its own HTTP status; the body is a short,
/// human-readable line rather than a structured payload, matching the
/// plain-text error responses the provider itself returns.
#[derive(Debug, Clone, thiserror::Error, displaydoc::Display, strum::AsRefStr)]
pub enum ApiError {
    /// bad request: {0}
    BadRequest(String),
    /// unauthorized
    Unauthorized,
    /// function not found: {0}
    NotFound(String),
    /// method not allowed
    MethodNotAllowed,
    /// upstream provider unavailable
    UpstreamUnavailable,
    /// upstream provider timed out
    UpstreamTimeout,
    /// timed out waiting for function to become ready: {0}
    ScaleTimeout(String),
    /// failed to enqueue invocation: {0}
    EnqueueFailed(String),
    /// async invocation queue is not configured
    QueueUnavailable,
    /// client disconnected
    Cancelled,
    /// internal error: {0}
    Internal(String),
}

impl From<ProviderError> for ApiError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::NotFound => ApiError::NotFound(String::new()),
            ProviderError::Unavailable => ApiError::UpstreamUnavailable,
        }
    }
}

impl From<InvalidFunctionName> for ApiError {
    fn from(error: InvalidFunctionName) -> Self {
        ApiError::BadRequest(error.to_string())
    }
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UpstreamUnavailable | ApiError::ScaleTimeout(_) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::EnqueueFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            // 499 is nginx's convention for "client closed request"; there
            // is no standard code, and the client is gone regardless.
            ApiError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Cancelled) {
            tracing::debug!("client disconnected, terminating silently");
        } else {
            tracing::warn!(error = %self, kind = self.as_ref(), "request failed");
        }
        (self.status_code(), self.to_string()).into_response()
    }
}
