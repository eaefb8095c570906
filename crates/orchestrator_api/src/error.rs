use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum OrchestratorApiError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0} {1}")]
    Status(StatusCode, String),

    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("malformed frame: {message}")]
    MalformedFrame { message: String, frame: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("decision for change {change_id} failed: {message}")]
    DecisionFailed { change_id: String, message: String },

    #[error("agent channel is not connected")]
    NotConnected,
}

impl From<tungstenite::Error> for OrchestratorApiError {
    fn from(error: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}

/// Error body shapes emitted by the backend: FastAPI's `{"detail": ...}` and
/// the service-level `{"error": ..., "status": "failed"}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    pub detail: Option<Value>,
    pub error: Option<Value>,
}

impl ErrorPayload {
    fn message(&self) -> Option<String> {
        self.detail
            .as_ref()
            .and_then(value_message)
            .or_else(|| self.error.as_ref().and_then(value_message))
    }
}

/// Extracts a user-facing message from a non-success HTTP response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.message());
    if let Some(message) = parsed {
        return message;
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn value_message(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty_string(text).map(str::to_owned),
        Value::Object(fields) => fields
            .get("message")
            .or_else(|| fields.get("msg"))
            .and_then(Value::as_str)
            .and_then(non_empty_string)
            .map(str::to_owned),
        Value::Array(items) => items.first().and_then(value_message),
        _ => None,
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
