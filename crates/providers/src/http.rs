//! Shared HTTP error mapping for all adapters.

use chat_core::llm::ChatError;
use reqwest::StatusCode;

pub(crate) fn map_reqwest_err(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout(e.to_string())
    } else if e.is_request() || e.is_connect() {
        ChatError::Network(e.to_string())
    } else {
        ChatError::Other(e.to_string())
    }
}

/// Providers agree on nesting their failure text under `error.message`.
pub(crate) fn provider_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v["error"]["message"].as_str().map(|s| s.to_string())
}

/// Consume a non-success response into the error surfaced to the caller,
/// preferring the provider's own message over the generic status line.
pub(crate) async fn reject(resp: reqwest::Response) -> ChatError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let msg = provider_message(&body)
        .unwrap_or_else(|| format!("chat request failed with status {}", status));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::Auth(msg),
        StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimit(msg),
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ChatError::Network(msg),
        _ => ChatError::Provider(msg),
    }
}
