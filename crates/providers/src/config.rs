use directories::BaseDirs;
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};

use crate::ProviderKind;

/// Optional overrides read from the config file. Everything has a sane
/// default; the file may be absent entirely.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FileConfig {
    pub openai_base_url: Option<String>,
    pub openrouter_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
    pub list_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub openai_key: Option<String>,
    pub openrouter_key: Option<String>,
    pub anthropic_key: Option<String>,
    pub gemini_key: Option<String>,
    pub openai_base_url: String,
    pub openrouter_base_url: String,
    pub anthropic_base_url: String,
    pub gemini_base_url: String,
    /// Bound on non-streaming calls (model listing); streams are unbounded.
    pub list_timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Credential plus endpoint for one adapter.
#[derive(Clone, Debug)]
pub struct AdapterConfig {
    pub api_key: String,
    pub base_url: String,
    pub list_timeout: Duration,
}

impl Config {
    pub fn from_env_and_file() -> anyhow::Result<Self> {
        let mut openai_base_url = "https://api.openai.com/v1".to_string();
        let mut openrouter_base_url = "https://openrouter.ai/api/v1".to_string();
        let mut anthropic_base_url = "https://api.anthropic.com/v1".to_string();
        let mut gemini_base_url =
            "https://generativelanguage.googleapis.com/v1beta".to_string();
        let mut list_timeout_ms = 15_000u64;
        let mut temperature = None;
        let mut max_tokens = None;

        if let Some(path) = Self::config_path() {
            if path.exists() {
                if let Ok(text) = fs::read_to_string(&path) {
                    if let Ok(file_cfg) = toml::from_str::<FileConfig>(&text) {
                        if let Some(u) = file_cfg.openai_base_url {
                            openai_base_url = u;
                        }
                        if let Some(u) = file_cfg.openrouter_base_url {
                            openrouter_base_url = u;
                        }
                        if let Some(u) = file_cfg.anthropic_base_url {
                            anthropic_base_url = u;
                        }
                        if let Some(u) = file_cfg.gemini_base_url {
                            gemini_base_url = u;
                        }
                        if let Some(t) = file_cfg.list_timeout_ms {
                            list_timeout_ms = t;
                        }
                        temperature = file_cfg.temperature;
                        max_tokens = file_cfg.max_tokens;
                    }
                }
            }
        }

        Ok(Config {
            openai_key: env_key("OPENAI_API_KEY"),
            openrouter_key: env_key("OPENROUTER_API_KEY"),
            anthropic_key: env_key("ANTHROPIC_API_KEY"),
            gemini_key: env_key("GEMINI_API_KEY"),
            openai_base_url,
            openrouter_base_url,
            anthropic_base_url,
            gemini_base_url,
            list_timeout: Duration::from_millis(list_timeout_ms),
            temperature,
            max_tokens,
        })
    }

    /// Adapter config for one provider, or `None` when no credential is
    /// set. A missing key disables the provider; it is never an error.
    pub fn adapter(&self, kind: ProviderKind) -> Option<AdapterConfig> {
        let (key, base_url) = match kind {
            ProviderKind::OpenAi => (&self.openai_key, &self.openai_base_url),
            ProviderKind::OpenRouter => (&self.openrouter_key, &self.openrouter_base_url),
            ProviderKind::Anthropic => (&self.anthropic_key, &self.anthropic_base_url),
            ProviderKind::Gemini => (&self.gemini_key, &self.gemini_base_url),
        };
        key.as_ref().map(|k| AdapterConfig {
            api_key: k.clone(),
            base_url: base_url.clone(),
            list_timeout: self.list_timeout,
        })
    }

    fn config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let p = if cfg!(target_os = "windows") {
            base.home_dir().join(".minichat").join("config.toml")
        } else {
            base.config_dir().join("minichat").join("config.toml")
        };
        Some(p)
    }
}

fn env_key(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
