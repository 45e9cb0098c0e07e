use chat_core::llm::{ChatError, ChatOpts, ChatStream, Message, ModelClient, ModelInfo};
use reqwest::{header, Client};
use tracing::{info, warn};

use crate::config::AdapterConfig;
use crate::http::{map_reqwest_err, reject};
use crate::openai::{chat_body, delta_stream};

const REFERER: &str = "http://localhost:5000";
const TITLE: &str = "minichat";

/// OpenRouter speaks the OpenAI chat-completions wire protocol; only the
/// attribution headers and the model-listing shape differ.
#[derive(Clone)]
pub struct OpenRouterClient {
    http: Client,
    cfg: AdapterConfig,
}

impl OpenRouterClient {
    pub fn new(cfg: AdapterConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))?,
        );
        headers.insert("HTTP-Referer", header::HeaderValue::from_static(REFERER));
        headers.insert("X-Title", header::HeaderValue::from_static(TITLE));
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
            .filter_map(|m| {
                let id = m["id"].as_str()?;
                let name = m["name"].as_str().unwrap_or(id);
                Some(ModelInfo { id: id.to_string(), name: name.to_string() })
            })
            .collect();
        // Display-name order, id as tiebreak so the ordering stays total.
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }
}

impl ModelClient for OpenRouterClient {
    async fn list_models(&self) -> Vec<ModelInfo> {
        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(target: "providers::openrouter", "model listing failed: {}", e);
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
        info!(target: "providers::openrouter", "start chat stream model={} url={}", opts.model, url);
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
        Ok(Box::pin(delta_stream(resp, "providers::openrouter")))
    }
}
