//! `POST /send` — publish bridge.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use housectl_app::ports::{MessagePublisher, OutboundMessage};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for the publish bridge.
///
/// `message` may be any JSON value; non-strings are published in their JSON
/// form.
#[derive(Deserialize)]
pub struct SendRequest {
    pub topic: Option<String>,
    pub message: Option<Value>,
}

/// Possible responses from the send endpoint.
pub enum SendResponse {
    Published,
}

impl IntoResponse for SendResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Published => {
                Json(serde_json::json!({ "status": "Message published" })).into_response()
            }
        }
    }
}

/// `POST /send`
pub async fn send<P: MessagePublisher>(
    State(state): State<AppState<P>>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<SendResponse, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected http publish body");
        ApiError::InvalidJson
    })?;

    let topic = request.topic.filter(|topic| !topic.trim().is_empty());
    let message = request.message.and_then(|message| match message {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    });
    let (Some(topic), Some(message)) = (topic, message) else {
        return Err(ApiError::MissingField);
    };

    tracing::info!(%topic, "publishing via http bridge");
    state
        .publisher
        .publish(OutboundMessage::transient(topic, message))
        .await
        .map_err(ApiError::Publish)?;
    Ok(SendResponse::Published)
}
