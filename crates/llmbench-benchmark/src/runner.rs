use std::sync::Arc;

use futures::StreamExt;
use llmbench_core::{BenchError, ChatReply, ResponseRecord, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, trace};

use crate::model_server::ModelServer;

/// Runs single prompts against a [`ModelServer`].
///
/// In streaming mode the generated text is forwarded to the token sink as
/// it arrives; without a sink it only shows up in `trace` logs.
#[derive(Clone)]
pub struct Executor {
    server: Arc<dyn ModelServer>,
    tokens: Option<UnboundedSender<String>>,
}

impl Executor {
    pub fn new(server: Arc<dyn ModelServer>) -> Self {
        Self {
            server,
            tokens: None,
        }
    }

    pub fn with_token_sink(mut self, tokens: UnboundedSender<String>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Benchmarks one prompt. Failures are logged and reported as `None`.
    pub async fn run(&self, model: &str, prompt: &str, stream: bool) -> Option<ResponseRecord> {
        match self.try_run(model, prompt, stream).await {
            Ok(response) => Some(response),
            Err(e) => {
                error!(model, stream, "Error during chat: {}", e);
                None
            }
        }
    }

    pub async fn try_run(&self, model: &str, prompt: &str, stream: bool) -> Result<ResponseRecord> {
        debug!(model, stream, "Benchmarking prompt");

        let last = if stream {
            self.run_streaming(model, prompt).await?
        } else {
            Some(self.server.chat(model, prompt).await?)
        };

        let reply = last.ok_or(BenchError::NoResponse)?;
        Ok(ResponseRecord::try_from(reply)?)
    }

    async fn run_streaming(&self, model: &str, prompt: &str) -> Result<Option<ChatReply>> {
        let mut chunks = self.server.chat_stream(model, prompt).await?;
        let mut last = None;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if let Some(message) = &chunk.message {
                self.emit(&message.content);
            }
            last = Some(chunk);
        }

        Ok(last)
    }

    fn emit(&self, content: &str) {
        if content.is_empty() {
            return;
        }
        match &self.tokens {
            Some(tx) => {
                let _ = tx.send(content.to_string());
            }
            None => trace!(content, "token"),
        }
    }
}

/// Model names to benchmark, minus `skip`, in the order the server lists them.
pub async fn try_benchmark_models(server: &dyn ModelServer, skip: &[String]) -> Result<Vec<String>> {
    let names: Vec<String> = server
        .list_models()
        .await?
        .into_iter()
        .filter(|name| !skip.contains(name))
        .collect();

    info!(models = ?names, "Evaluating models");
    Ok(names)
}

/// Like [`try_benchmark_models`], but an unreachable server yields no models.
pub async fn benchmark_models(server: &dyn ModelServer, skip: &[String]) -> Vec<String> {
    match try_benchmark_models(server, skip).await {
        Ok(names) => names,
        Err(e) => {
            error!("Error fetching models from Ollama: {}", e);
            Vec::new()
        }
    }
}
