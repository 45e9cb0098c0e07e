pub mod llm {
    use futures::Stream;
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        System,
        User,
        Assistant,
    }

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Message {
        pub role: Role,
        pub content: String,
    }

    impl Message {
        pub fn system<S: Into<String>>(s: S) -> Self {
            Self { role: Role::System, content: s.into() }
        }
        pub fn user<S: Into<String>>(s: S) -> Self {
            Self { role: Role::User, content: s.into() }
        }
        pub fn assistant<S: Into<String>>(s: S) -> Self {
            Self { role: Role::Assistant, content: s.into() }
        }
    }

    /// One selectable model. `id` is the exact wire identifier the provider
    /// expects back on chat calls; `name` is display-only and may equal `id`.
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ModelInfo {
        pub id: String,
        pub name: String,
    }

    #[derive(Clone, Debug, Default)]
    pub struct ChatOpts {
        pub model: String,
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
    }

    /// One decoded fragment of a streaming response. Concatenating every
    /// `Text` payload of a stream, in order, yields the full reply.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ChatDelta {
        Text(String),
        Finish,
    }

    #[derive(Error, Debug)]
    pub enum ChatError {
        #[error("auth error: {0}")] Auth(String),
        #[error("rate limit: {0}")] RateLimit(String),
        #[error("timeout: {0}")] Timeout(String),
        #[error("network: {0}")] Network(String),
        #[error("decode: {0}")] Decode(String),
        #[error("{0}")] Provider(String),
        #[error("other: {0}")] Other(String),
    }

    pub type ChatStream<'a> = Pin<Box<dyn Stream<Item = Result<ChatDelta, ChatError>> + Send + 'a>>;

    use std::pin::Pin;

    /// Two-operation provider contract. `list_models` never fails outward:
    /// any internal error degrades to an empty list. `stream_chat` rejects
    /// when the initial request is refused, but a single malformed frame
    /// mid-stream is skipped rather than fatal.
    #[allow(async_fn_in_trait)]
    pub trait ModelClient: Send + Sync {
        async fn list_models(&self) -> Vec<ModelInfo>;
        async fn stream_chat<'a>(
            &'a self,
            msgs: Vec<Message>,
            opts: ChatOpts,
        ) -> Result<ChatStream<'a>, ChatError>;
    }
}
