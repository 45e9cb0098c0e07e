//! Provider adapters: one variant per backend, all converging on the
//! `ModelClient` contract from `chat_core`.

pub mod anthropic;
pub mod config;
pub mod gemini;
mod http;
pub mod openai;
pub mod openrouter;
pub mod sse;

use std::fmt;

use chat_core::llm::{ChatError, ChatOpts, ChatStream, Message, ModelClient, ModelInfo};

use crate::config::Config;

/// The closed set of supported backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    OpenRouter,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::OpenRouter,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "openrouter" => Some(ProviderKind::OpenRouter),
            "anthropic" => Some(ProviderKind::Anthropic),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One constructed adapter. Built once per credential at startup and
/// immutable afterwards; all decode state is scoped to individual calls.
pub enum Provider {
    OpenAi(openai::OpenAiClient),
    OpenRouter(openrouter::OpenRouterClient),
    Anthropic(anthropic::AnthropicClient),
    Gemini(gemini::GeminiClient),
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::OpenAi(_) => ProviderKind::OpenAi,
            Provider::OpenRouter(_) => ProviderKind::OpenRouter,
            Provider::Anthropic(_) => ProviderKind::Anthropic,
            Provider::Gemini(_) => ProviderKind::Gemini,
        }
    }

    /// Build the adapter for `kind`, or `None` when its credential is
    /// absent (the provider is disabled, not broken).
    pub fn connect(kind: ProviderKind, cfg: &Config) -> anyhow::Result<Option<Provider>> {
        let Some(adapter_cfg) = cfg.adapter(kind) else {
            return Ok(None);
        };
        let p = match kind {
            ProviderKind::OpenAi => Provider::OpenAi(openai::OpenAiClient::new(adapter_cfg)?),
            ProviderKind::OpenRouter => {
                Provider::OpenRouter(openrouter::OpenRouterClient::new(adapter_cfg)?)
            }
            ProviderKind::Anthropic => {
                Provider::Anthropic(anthropic::AnthropicClient::new(adapter_cfg)?)
            }
            ProviderKind::Gemini => Provider::Gemini(gemini::GeminiClient::new(adapter_cfg)?),
        };
        Ok(Some(p))
    }

    /// All adapters with a configured credential, in declaration order.
    pub fn available(cfg: &Config) -> anyhow::Result<Vec<Provider>> {
        let mut out = Vec::new();
        for kind in ProviderKind::ALL {
            if let Some(p) = Provider::connect(kind, cfg)? {
                out.push(p);
            }
        }
        Ok(out)
    }
}

impl ModelClient for Provider {
    async fn list_models(&self) -> Vec<ModelInfo> {
        match self {
            Provider::OpenAi(c) => c.list_models().await,
            Provider::OpenRouter(c) => c.list_models().await,
            Provider::Anthropic(c) => c.list_models().await,
            Provider::Gemini(c) => c.list_models().await,
        }
    }

    async fn stream_chat<'a>(
        &'a self,
        msgs: Vec<Message>,
        opts: ChatOpts,
    ) -> Result<ChatStream<'a>, ChatError> {
        match self {
            Provider::OpenAi(c) => c.stream_chat(msgs, opts).await,
            Provider::OpenRouter(c) => c.stream_chat(msgs, opts).await,
            Provider::Anthropic(c) => c.stream_chat(msgs, opts).await,
            Provider::Gemini(c) => c.stream_chat(msgs, opts).await,
        }
    }
}
