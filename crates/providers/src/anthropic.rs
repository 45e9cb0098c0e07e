use chat_core::llm::{
    ChatDelta, ChatError, ChatOpts, ChatStream, Message, ModelClient, ModelInfo, Role,
};
use futures::StreamExt;
use reqwest::{header, Client};
use tracing::{debug, info};

use crate::config::AdapterConfig;
use crate::http::{map_reqwest_err, reject};
use crate::sse;

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

// No public client-side listing endpoint; a fixed catalog stands in.
const CATALOG: &[(&str, &str)] = &[
    ("claude-3-opus-20240229", "Claude 3 Opus"),
    ("claude-3-sonnet-20240229", "Claude 3 Sonnet"),
    ("claude-3-haiku-20240307", "Claude 3 Haiku"),
    ("claude-3-5-sonnet-20240620", "Claude 3.5 Sonnet"),
];

#[derive(Clone)]
pub struct AnthropicClient {
    http: Client,
    cfg: AdapterConfig,
}

impl AnthropicClient {
    pub fn new(cfg: AdapterConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert("x-api-key", header::HeaderValue::from_str(&cfg.api_key)?);
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(API_VERSION),
        );
        let http = Client::builder()
            .default_headers(headers)
            .use_rustls_tls()
            .build()?;
        Ok(Self { http, cfg })
    }
}

/// Messages request body. The leading system message leaves the message
/// array and rides in the top-level `system` field; the wire refuses a
/// `system` role entry.
pub(crate) fn chat_body(msgs: &[Message], opts: &ChatOpts) -> serde_json::Value {
    let system = msgs
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.clone());
    let wire: Vec<serde_json::Value> = msgs
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::User | Role::System => "user",
                Role::Assistant => "assistant",
            };
            serde_json::json!({"role": role, "content": m.content})
        })
        .collect();
    let mut body = serde_json::json!({
        "model": opts.model,
        "messages": wire,
        "max_tokens": opts.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "stream": true,
    });
    let map = body.as_object_mut().expect("body is an object");
    if let Some(s) = system {
        map.insert("system".to_string(), serde_json::json!(s));
    }
    if let Some(t) = opts.temperature {
        map.insert("temperature".to_string(), serde_json::json!(t));
    }
    body
}

/// Text payload of one SSE event block, if it is a text delta. Frames
/// that fail to parse or have another shape yield `None`.
pub(crate) fn event_text(block: &str) -> Option<String> {
    let data = sse::event_data(block)?;
    let v: serde_json::Value = match serde_json::from_str(&data) {
        Ok(v) => v,
        Err(e) => {
            debug!(target: "providers::anthropic", "skipping malformed frame: {}", e);
            return None;
        }
    };
    if v["type"] != "content_block_delta" || v["delta"]["type"] != "text_delta" {
        return None;
    }
    v["delta"]["text"].as_str().map(|s| s.to_string())
}

impl ModelClient for AnthropicClient {
    async fn list_models(&self) -> Vec<ModelInfo> {
        let mut out: Vec<ModelInfo> = CATALOG
            .iter()
            .map(|(id, name)| ModelInfo { id: id.to_string(), name: name.to_string() })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    async fn stream_chat<'a>(
        &'a self,
        msgs: Vec<Message>,
        opts: ChatOpts,
    ) -> Result<ChatStream<'a>, ChatError> {
        let url = format!("{}/messages", self.cfg.base_url.trim_end_matches('/'));
        info!(target: "providers::anthropic", "start chat stream model={} url={}", opts.model, url);
        let body = chat_body(&msgs, &opts);
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            return Err(reject(resp).await);
        }
        let mut bytes = resp.bytes_stream();
        // No sentinel on this wire; the stream ends when the transport does.
        let s = async_stream::stream! {
            let mut events = sse::EventBuffer::default();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(b) => {
                        events.push(&b);
                        while let Some(block) = events.next_event() {
                            if let Some(text) = event_text(&block) {
                                yield Ok(ChatDelta::Text(text));
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(map_reqwest_err(e));
                        return;
                    }
                }
            }
            yield Ok(ChatDelta::Finish);
        };
        Ok(Box::pin(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new(AdapterConfig {
            api_key: "ant-key".into(),
            base_url: server.uri(),
            list_timeout: Duration::from_secs(15),
        })
        .unwrap()
    }

    fn opts() -> ChatOpts {
        ChatOpts { model: "claude-3-haiku-20240307".into(), ..Default::default() }
    }

    #[tokio::test]
    async fn catalog_is_deterministically_ordered() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let models = client.list_models().await;
        assert_eq!(models.len(), 4);
        let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(models, client.list_models().await);
    }

    #[test]
    fn system_message_relocates_to_top_level_field() {
        let msgs = vec![
            Message::system("be terse"),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let body = chat_body(&msgs, &opts());
        assert_eq!(body["system"], "be terse");
        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 2);
        assert!(wire.iter().all(|m| m["role"] != "system"));
    }

    #[test]
    fn max_tokens_defaults_when_unset() {
        let body = chat_body(&[Message::user("hi")], &opts());
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(body.get("system").is_none());

        let body = chat_body(
            &[Message::user("hi")],
            &ChatOpts { model: "m".into(), max_tokens: Some(512), temperature: Some(0.5) },
        );
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn only_text_delta_frames_carry_payload() {
        let delta = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}",
        );
        assert_eq!(event_text(delta).as_deref(), Some("Hi"));
        assert_eq!(event_text("event: ping\ndata: {\"type\":\"ping\"}"), None);
        assert_eq!(event_text("data: {broken"), None);
        assert_eq!(
            event_text("data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"input_json_delta\"}}"),
            None
        );
    }

    #[tokio::test]
    async fn stream_ends_on_transport_close_without_sentinel() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: message_start\ndata: {\"type\":\"message_start\"}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
            "data: {nope\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "ant-key"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let stream = client
            .stream_chat(vec![Message::user("hi")], opts())
            .await
            .unwrap();
        let deltas: Vec<ChatDelta> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(
            deltas,
            [
                ChatDelta::Text("Hel".into()),
                ChatDelta::Text("lo".into()),
                ChatDelta::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn rejection_carries_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid key"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .stream_chat(vec![Message::user("hi")], opts())
            .await
            .err()
            .expect("request must be rejected");
        assert!(err.to_string().contains("invalid key"), "got: {}", err);
    }
}
