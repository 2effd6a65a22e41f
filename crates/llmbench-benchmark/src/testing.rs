use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream;
use llmbench_core::{BenchError, ChatReply, Message, Result};
use tokio::sync::Semaphore;

use crate::model_server::{ChatStream, ModelServer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// In-memory [`ModelServer`] with scripted failures.
#[derive(Default)]
pub struct FakeServer {
    models: Option<Vec<String>>,
    failing: HashSet<(String, String)>,
    empty_stream: bool,
    malformed: bool,
    saturated: bool,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeServer {
    pub fn with_models(models: &[&str]) -> Self {
        Self {
            models: Some(models.iter().map(|m| m.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn failing(mut self, model: &str, prompt: &str) -> Self {
        self.failing.insert((model.to_string(), prompt.to_string()));
        self
    }

    pub fn empty_stream(mut self) -> Self {
        self.empty_stream = true;
        self
    }

    pub fn malformed(mut self) -> Self {
        self.malformed = true;
        self
    }

    /// Final replies carry counters at the top of the `u64` range.
    pub fn saturated(mut self) -> Self {
        self.saturated = true;
        self
    }

    /// Every chat call waits for one permit on the returned semaphore.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn begin(&self, model: &str, prompt: &str, stream: bool) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream,
        });

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.failing.contains(&(model.to_string(), prompt.to_string())) {
            return Err(BenchError::Http("API connection failed".to_string()));
        }
        Ok(())
    }

    fn final_reply(&self, model: &str, content: &str) -> ChatReply {
        if self.malformed {
            return ChatReply {
                model: Some(model.to_string()),
                done: true,
                ..Default::default()
            };
        }

        let (prompt_eval_duration, eval_count) = if self.saturated {
            (u64::MAX, u64::MAX)
        } else {
            (200_000_000, 20)
        };

        ChatReply {
            model: Some(model.to_string()),
            created_at: Some(Utc::now().to_rfc3339()),
            message: Some(Message {
                role: "assistant".to_string(),
                content: content.to_string(),
            }),
            done: true,
            total_duration: Some(1_000_000_000),
            load_duration: Some(500_000_000),
            prompt_eval_count: Some(10),
            prompt_eval_duration: Some(prompt_eval_duration),
            eval_count: Some(eval_count),
            eval_duration: Some(300_000_000),
            error: None,
        }
    }
}

#[async_trait]
impl ModelServer for FakeServer {
    async fn list_models(&self) -> Result<Vec<String>> {
        self.models
            .clone()
            .ok_or_else(|| BenchError::Http("connection refused".to_string()))
    }

    async fn chat(&self, model: &str, prompt: &str) -> Result<ChatReply> {
        self.begin(model, prompt, false).await?;
        Ok(self.final_reply(model, "Test response"))
    }

    async fn chat_stream(&self, model: &str, prompt: &str) -> Result<ChatStream> {
        self.begin(model, prompt, true).await?;
        if self.empty_stream {
            return Ok(Box::pin(stream::empty::<Result<ChatReply>>()));
        }

        let first = ChatReply {
            message: Some(Message {
                role: "assistant".to_string(),
                content: "Test ".to_string(),
            }),
            ..Default::default()
        };
        let chunks = vec![Ok(first), Ok(self.final_reply(model, "response"))];
        Ok(Box::pin(stream::iter(chunks)))
    }
}
