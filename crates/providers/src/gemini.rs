use chat_core::llm::{
    ChatDelta, ChatError, ChatOpts, ChatStream, Message, ModelClient, ModelInfo, Role,
};
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::config::AdapterConfig;
use crate::http::{map_reqwest_err, reject};
use crate::sse;

// Public listing needs OAuth rather than an API key; fixed catalog instead.
const CATALOG: &[(&str, &str)] = &[
    ("gemini-1.5-flash", "Gemini 1.5 Flash"),
    ("gemini-1.5-pro", "Gemini 1.5 Pro"),
    ("gemini-1.0-pro", "Gemini 1.0 Pro"),
];

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    cfg: AdapterConfig,
}

impl GeminiClient {
    pub fn new(cfg: AdapterConfig) -> anyhow::Result<Self> {
        let http = Client::builder().use_rustls_tls().build()?;
        Ok(Self { http, cfg })
    }

    /// Streaming endpoint for one model, credential as query parameter.
    fn stream_url(&self, model: &str) -> Result<Url, ChatError> {
        let raw = format!(
            "{}/models/{}:streamGenerateContent",
            self.cfg.base_url.trim_end_matches('/'),
            model
        );
        let mut url = Url::parse(&raw).map_err(|e| ChatError::Other(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("key", &self.cfg.api_key)
            .append_pair("alt", "sse");
        Ok(url)
    }
}

/// generateContent request body. Roles shrink to the `{user, model}`
/// vocabulary; a leading system message becomes `systemInstruction` on
/// models that support it and is otherwise folded into the first user turn.
pub(crate) fn chat_body(msgs: &[Message], opts: &ChatOpts) -> serde_json::Value {
    let system = msgs
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.clone());
    let mut contents: Vec<serde_json::Value> = msgs
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::Assistant => "model",
                _ => "user",
            };
            serde_json::json!({"role": role, "parts": [{"text": m.content}]})
        })
        .collect();

    let mut body = serde_json::json!({});
    let supports_instruction = opts.model.contains("1.5");
    if let Some(sys) = system {
        if supports_instruction {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": sys}]});
        } else if let Some(first_user) = contents.iter_mut().find(|c| c["role"] == "user") {
            let merged = format!(
                "{}\n\n{}",
                sys,
                first_user["parts"][0]["text"].as_str().unwrap_or("")
            );
            first_user["parts"][0]["text"] = serde_json::Value::String(merged);
        } else {
            contents.insert(0, serde_json::json!({"role": "user", "parts": [{"text": sys}]}));
        }
    }
    body["contents"] = serde_json::json!(contents);

    let mut generation = serde_json::Map::new();
    if let Some(t) = opts.temperature {
        generation.insert("temperature".to_string(), serde_json::json!(t));
    }
    if let Some(m) = opts.max_tokens {
        generation.insert("maxOutputTokens".to_string(), serde_json::json!(m));
    }
    if !generation.is_empty() {
        body["generationConfig"] = serde_json::Value::Object(generation);
    }
    body
}

/// Text payload of one `data:` line, if it carries a candidate part.
pub(crate) fn line_text(line: &str) -> Option<String> {
    let payload = sse::data_line(line)?;
    let v: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            debug!(target: "providers::gemini", "skipping malformed frame: {}", e);
            return None;
        }
    };
    v["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
}

impl ModelClient for GeminiClient {
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
        let url = self.stream_url(&opts.model)?;
        info!(target: "providers::gemini", "start chat stream model={}", opts.model);
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
            let mut lines = sse::LineBuffer::default();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(b) => {
                        lines.push(&b);
                        while let Some(line) = lines.next_line() {
                            if let Some(text) = line_text(&line) {
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
