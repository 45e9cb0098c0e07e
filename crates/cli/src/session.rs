//! Conversation orchestration: owns the message history, feeds the active
//! provider, and accumulates streamed deltas into the assistant reply.

use chat_core::llm::{ChatDelta, ChatError, ChatOpts, Message, ModelClient, Role};
use futures::StreamExt;
use tracing::info;

use crate::backend::Settings;

/// One conversation. Created at session start, dropped at session end;
/// several sessions can coexist since nothing here is global.
pub struct ChatSession {
    pub messages: Vec<Message>,
    pub settings: Settings,
    pub model: String,
}

impl ChatSession {
    pub fn new(settings: Settings, model: String, history: Vec<Message>) -> Self {
        ChatSession { messages: history, settings, model }
    }

    /// Run one turn: append the user message, stream the reply through
    /// `on_delta`, and return the final concatenated text. On failure the
    /// in-progress assistant entry is replaced with an error notice rather
    /// than left half-filled.
    pub async fn send<C, F>(
        &mut self,
        client: &C,
        text: &str,
        mut on_delta: F,
    ) -> Result<String, ChatError>
    where
        C: ModelClient,
        F: FnMut(&str),
    {
        self.messages.push(Message::user(text));
        let outgoing = self.outgoing();
        let reply_idx = self.messages.len();
        self.messages.push(Message::assistant(String::new()));

        let opts = ChatOpts {
            model: self.model.clone(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        info!(target: "cli::session", "send: model={} history_len={}", self.model, outgoing.len());

        let mut stream = match client.stream_chat(outgoing, opts).await {
            Ok(s) => s,
            Err(e) => {
                self.messages[reply_idx].content = format!("[error] {}", e);
                return Err(e);
            }
        };
        while let Some(item) = stream.next().await {
            match item {
                Ok(ChatDelta::Text(t)) => {
                    self.messages[reply_idx].content.push_str(&t);
                    on_delta(&t);
                }
                Ok(ChatDelta::Finish) => break,
                Err(e) => {
                    self.messages[reply_idx].content = format!("[error] {}", e);
                    return Err(e);
                }
            }
        }
        Ok(self.messages[reply_idx].content.clone())
    }

    /// Wire snapshot for the next request: the configured system prompt
    /// (when non-empty) followed by the stored history. The prompt never
    /// enters `messages` itself.
    fn outgoing(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if !self.settings.system_prompt.trim().is_empty() {
            out.push(Message::system(self.settings.system_prompt.clone()));
        }
        out.extend(
            self.messages
                .iter()
                .filter(|m| !(m.role == Role::Assistant && m.content.is_empty()))
                .cloned(),
        );
        out
    }
}
