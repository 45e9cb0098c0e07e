//! Client for the companion settings/audit server.

use std::{env, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub system_prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            system_prompt: "You are a helpful and direct assistant.".to_string(),
            max_tokens: Some(2000),
            temperature: Some(0.7),
        }
    }
}

/// One audit record per completed turn.
#[derive(Clone, Debug, Serialize)]
pub struct InteractionRecord {
    pub provider: String,
    pub model: String,
    pub user_message: String,
    pub ai_response: String,
    pub settings: Settings,
}

#[derive(Clone)]
pub struct Backend {
    http: reqwest::Client,
    base_url: String,
}

impl Backend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Backend { http, base_url: base_url.into() }
    }

    pub fn from_env() -> Self {
        let base = env::var("CHAT_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Persisted settings, or defaults when the server is unreachable or
    /// answers garbage. Listing and conversation never depend on this.
    pub async fn fetch_settings(&self) -> Settings {
        let res = async {
            let resp = self.http.get(self.url("/api/settings")).send().await?;
            resp.error_for_status()?.json::<Settings>().await
        }
        .await;
        match res {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "cli::backend", "settings fetch failed, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    /// Persist settings. Unlike the audit log this failure is the user's
    /// business, so it propagates.
    pub async fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(self.url("/api/settings"))
            .json(settings)
            .send()
            .await
            .context("settings save request failed")?;
        resp.error_for_status().context("settings save rejected")?;
        Ok(())
    }

    pub(crate) async fn post_log(&self, record: &InteractionRecord) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(self.url("/api/log"))
            .json(record)
            .send()
            .await?;
        resp.error_for_status()?;
        Ok(())
    }

    /// Fire-and-forget audit record. Runs detached; failures are logged
    /// at debug and never interrupt the conversation flow.
    pub fn log_interaction(&self, record: InteractionRecord) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.post_log(&record).await {
                debug!(target: "cli::backend", "interaction log dropped: {}", e);
            }
        });
    }
}
