use async_trait::async_trait;
use futures::stream::BoxStream;
use llmbench_core::{ChatReply, Result};

/// Stream of incremental chat chunks; the last one carries the counters.
pub type ChatStream = BoxStream<'static, Result<ChatReply>>;

/// The model-serving backend a benchmark talks to.
#[async_trait]
pub trait ModelServer: Send + Sync {
    /// Names of every model the server can run.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// One non-streaming chat turn with a single user message.
    async fn chat(&self, model: &str, prompt: &str) -> Result<ChatReply>;

    /// Same request as [`ModelServer::chat`], streamed chunk by chunk.
    async fn chat_stream(&self, model: &str, prompt: &str) -> Result<ChatStream>;
}
