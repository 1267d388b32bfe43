//! Error to HTTP response mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::errors::{AppError, RenderError};

/// Map an application error onto a status code and plain-text body
pub fn handle_error(error: AppError) -> Response {
    let status = match &error {
        AppError::Render(RenderError::NoChannels) | AppError::EmptyResult { .. } => {
            StatusCode::NOT_FOUND
        }
        AppError::Render(RenderError::NoUrls { .. }) => StatusCode::NOT_FOUND,
        AppError::Configuration { .. } => StatusCode::BAD_REQUEST,
        AppError::Acquisition(_) => StatusCode::BAD_GATEWAY,
        AppError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Io(_) | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", error);
    }
    (status, error.to_string()).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self)
    }
}
