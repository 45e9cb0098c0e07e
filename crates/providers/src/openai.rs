use chat_core::llm::{
    ChatDelta, ChatError, ChatOpts, ChatStream, Message, ModelClient, ModelInfo, Role,
};
use futures::StreamExt;
use reqwest::{header, Client};
use tracing::{debug, info, warn};

use crate::config::AdapterConfig;
use crate::http::{map_reqwest_err, reject};
use crate::sse;

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    cfg: AdapterConfig,
}

impl OpenAiClient {
    pub fn new(cfg: AdapterConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))?,
        );
        let http = Client::builder()
            .default_headers(headers)
            .use_rustls_tls()
            .build()?;
        Ok(Self { http, cfg })
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        let url = format!("{}/models", self.cfg.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(url)
            .timeout(self.cfg.list_timeout)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            return Err(reject(resp).await);
        }
        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        let data = v["data"]
            .as_array()
            .ok_or_else(|| ChatError::Decode("models response missing data array".into()))?;
        let mut out: Vec<ModelInfo> = data
            .iter()
            .filter_map(|m| m["id"].as_str())
            .filter(|id| id.contains("gpt"))
            .map(|id| ModelInfo { id: id.to_string(), name: id.to_string() })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}

impl ModelClient for OpenAiClient {
    async fn list_models(&self) -> Vec<ModelInfo> {
        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(target: "providers::openai", "model listing failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn stream_chat<'a>(
        &'a self,
        msgs: Vec<Message>,
        opts: ChatOpts,
    ) -> Result<ChatStream<'a>, ChatError> {
        let url = format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'));
        info!(target: "providers::openai", "start chat stream model={} url={}", opts.model, url);
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
        Ok(Box::pin(delta_stream(resp, "providers::openai")))
    }
}

/// Chat-completions request body shared by the OpenAI-compatible adapters.
pub(crate) fn chat_body(msgs: &[Message], opts: &ChatOpts) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": opts.model,
        "messages": wire_messages(msgs),
        "stream": true,
    });
    let map = body.as_object_mut().expect("body is an object");
    if let Some(t) = opts.temperature {
        map.insert("temperature".to_string(), serde_json::json!(t));
    }
    if let Some(m) = opts.max_tokens {
        map.insert("max_tokens".to_string(), serde_json::json!(m));
    }
    body
}

/// Messages pass through unchanged, an inline system entry included.
pub(crate) fn wire_messages(msgs: &[Message]) -> Vec<serde_json::Value> {
    msgs.iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            serde_json::json!({"role": role, "content": m.content})
        })
        .collect()
}

pub(crate) enum StreamLine {
    Text(String),
    Done,
    Skip,
}

/// Decode one `data:` line of a chat-completions stream. Malformed JSON
/// and lines without a text delta are skipped, never fatal.
pub(crate) fn parse_stream_line(line: &str, log_target: &str) -> StreamLine {
    let Some(payload) = sse::data_line(line) else {
        return StreamLine::Skip;
    };
    if payload.trim() == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(v) => match v["choices"][0]["delta"]["content"].as_str() {
            Some(text) if !text.is_empty() => StreamLine::Text(text.to_string()),
            _ => StreamLine::Skip,
        },
        Err(e) => {
            debug!(target: "providers", "{}: skipping malformed frame: {}", log_target, e);
            StreamLine::Skip
        }
    }
}

/// Turn a chat-completions response body into the delta stream. Per-call
/// decode state lives inside the generator, so concurrent calls never
/// share a buffer.
pub(crate) fn delta_stream(
    resp: reqwest::Response,
    log_target: &'static str,
) -> impl futures::Stream<Item = Result<ChatDelta, ChatError>> {
    let mut bytes = resp.bytes_stream();
    async_stream::stream! {
        let mut lines = sse::LineBuffer::default();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(b) => {
                    lines.push(&b);
                    while let Some(line) = lines.next_line() {
                        match parse_stream_line(&line, log_target) {
                            StreamLine::Text(t) => yield Ok(ChatDelta::Text(t)),
                            StreamLine::Done => {
                                yield Ok(ChatDelta::Finish);
                                return;
                            }
                            StreamLine::Skip => {}
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(AdapterConfig {
            api_key: "test-key".into(),
            base_url: server.uri(),
            list_timeout: Duration::from_secs(15),
        })
        .unwrap()
    }

    async fn collect(stream: ChatStream<'_>) -> Vec<Result<ChatDelta, ChatError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn models_are_filtered_and_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": "gpt-4o"},
                    {"id": "dall-e-3"},
                    {"id": "gpt-3.5-turbo"},
                    {"id": "whisper-1"},
                ]
            })))
            .mount(&server)
            .await;

        let models = client_for(&server).list_models().await;
        let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["gpt-3.5-turbo", "gpt-4o"]);
        assert!(models.iter().all(|m| m.name == m.id));
    }

    #[tokio::test]
    async fn listing_failure_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        assert!(client_for(&server).list_models().await.is_empty());

        // Connection refused behaves the same as a server error.
        let gone = client_for(&server);
        drop(server);
        assert!(gone.list_models().await.is_empty());
    }

    #[tokio::test]
    async fn stream_yields_deltas_in_order_until_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let stream = client
            .stream_chat(
                vec![Message::user("hi")],
                ChatOpts { model: "gpt-4o".into(), ..Default::default() },
            )
            .await
            .unwrap();
        let items = collect(stream).await;
        let deltas: Vec<ChatDelta> = items.into_iter().map(|r| r.unwrap()).collect();
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
    async fn malformed_frame_does_not_abort_the_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: {not json\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"still ok\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let stream = client
            .stream_chat(
                vec![Message::user("hi")],
                ChatOpts { model: "gpt-4o".into(), ..Default::default() },
            )
            .await
            .unwrap();
        let texts: Vec<String> = collect(stream)
            .await
            .into_iter()
            .filter_map(|r| match r.unwrap() {
                ChatDelta::Text(t) => Some(t),
                ChatDelta::Finish => None,
            })
            .collect();
        assert_eq!(texts, ["ok", "still ok"]);
    }

    #[tokio::test]
    async fn rejection_carries_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "invalid key"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .stream_chat(
                vec![Message::user("hi")],
                ChatOpts { model: "gpt-4o".into(), ..Default::default() },
            )
            .await
            .err()
            .expect("request must be rejected");
        assert!(err.to_string().contains("invalid key"), "got: {}", err);
    }

    #[test]
    fn wire_messages_keep_inline_system_entry() {
        let msgs = vec![Message::system("be terse"), Message::user("hi")];
        let wire = wire_messages(&msgs);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[0]["content"], "be terse");
        assert_eq!(wire[1]["role"], "user");
    }
}
