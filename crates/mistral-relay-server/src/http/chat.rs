//! `POST /api/chat`: forwards a chat completion to Mistral and relays the
//! answer, streamed or whole.

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::TryStreamExt as _;
use serde::Deserialize;
use tracing::{debug, warn};

use mistral_relay::{
    AbortSignal, CompletionOptions, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    ProviderRequest, WireMessage,
};

use crate::http::error::{ApiError, MESSAGES_REQUIRED};
use crate::state::AppState;

/// Inbound request body. Extra message fields (ids, timestamps) are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRelayRequest {
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: Option<bool>,
}

impl ChatRelayRequest {
    fn into_provider_request(self) -> ProviderRequest {
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let options = CompletionOptions {
            temperature: Some(self.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            max_tokens: Some(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        };
        ProviderRequest::new(model, self.messages, &options, self.stream.unwrap_or(false))
    }
}

/// Validates the raw body before typed parsing so a missing or non-array
/// `messages` gets its dedicated message.
fn parse_body(body: &[u8]) -> Result<ChatRelayRequest, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?;
    let messages = value
        .get("messages")
        .and_then(|m| m.as_array())
        .ok_or_else(|| ApiError::BadRequest(MESSAGES_REQUIRED.to_string()))?;
    if messages.is_empty() {
        return Err(ApiError::BadRequest(MESSAGES_REQUIRED.to_string()));
    }
    serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

pub async fn relay_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = parse_body(&body)?;
    let provider = state.provider.clone().ok_or(ApiError::MissingApiKey)?;
    let request = request.into_provider_request();
    debug!(model = %request.model(), messages = request.messages().len(), stream = request.is_stream(), "relaying chat request");

    let signal = AbortSignal::never();
    if !request.is_stream() {
        let value = provider.complete_raw(&request, &signal).await?;
        return Ok(axum::Json(value).into_response());
    }

    let model = request.model().to_owned();
    let bytes = provider
        .open_stream(&request, &signal)
        .await?
        .inspect_err(move |e| warn!(model = %model, error = %e, "upstream stream failed mid-relay"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(bytes),
    )
        .into_response())
}
