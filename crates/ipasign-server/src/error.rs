//! HTTP error responses.
//!
//! Every failure is reported as a plain-text body. Tool diagnostics are
//! relayed (already redacted by the pipeline); internal I/O details are not.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ipasign_core::SigningError;

/// Error type returned by the route handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Signing(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Multipart(e) => e.body_text(),
            ApiError::Signing(SigningError::Workspace(_) | SigningError::Io(_)) => {
                "Failed to prepare signing workspace.".to_string()
            }
            ApiError::Signing(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, self.body()).into_response()
    }
}
