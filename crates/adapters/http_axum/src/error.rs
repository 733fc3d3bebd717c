//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use housectl_domain::error::{TransportError, error_chain};
use serde::Serialize;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Failures of the HTTP surface, each mapped to a status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid JSON payload")]
    InvalidJson,

    #[error("Missing topic or message")]
    MissingField,

    #[error("publish failed")]
    Publish(#[source] TransportError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidJson | Self::MissingField => StatusCode::BAD_REQUEST,
            Self::Publish(_) => {
                tracing::error!(error = %error_chain(&self), "http publish failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorBody {
                error: error_chain(&self),
            }),
        )
            .into_response()
    }
}
