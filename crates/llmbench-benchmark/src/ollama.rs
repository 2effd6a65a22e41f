use async_trait::async_trait;
use futures::StreamExt;
use llmbench_core::{BenchError, ChatReply, Message, OllamaConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::model_server::{ChatStream, ModelServer};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
}

impl OllamaClient {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BenchError::Http(e.to_string()))?;

        Ok(Self {
            host: config.host.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn post_chat(&self, model: &str, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.host);
        let request = ChatRequest {
            model,
            messages: vec![Message::user(prompt)],
            stream,
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BenchError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BenchError::Ollama(format!(
                "Chat failed: {} - {}",
                status, body
            )));
        }

        Ok(resp)
    }
}

#[async_trait]
impl ModelServer for OllamaClient {
    #[instrument(skip(self), fields(host = %self.host))]
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.host);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BenchError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BenchError::Ollama(format!(
                "Failed to list models: {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| BenchError::Http(e.to_string()))?;

        let names = parse_tags(&body)?;
        debug!(count = names.len(), "Fetched models from Ollama");
        Ok(names)
    }

    #[instrument(skip(self, prompt))]
    async fn chat(&self, model: &str, prompt: &str) -> Result<ChatReply> {
        let body = self
            .post_chat(model, prompt, false)
            .await?
            .text()
            .await
            .map_err(|e| BenchError::Http(e.to_string()))?;

        parse_reply(&body)
    }

    #[instrument(skip(self, prompt))]
    async fn chat_stream(&self, model: &str, prompt: &str) -> Result<ChatStream> {
        let mut bytes = Box::pin(self.post_chat(model, prompt, true).await?.bytes_stream());
        info!("Streaming chat response");

        let stream = async_stream::stream! {
            let mut lines = LineBuffer::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(BenchError::Http(e.to_string()));
                        return;
                    }
                };
                for line in lines.push(&chunk) {
                    yield parse_reply(&line);
                }
            }
            if let Some(line) = lines.finish() {
                yield parse_reply(&line);
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_tags(body: &str) -> Result<Vec<String>> {
    let tags: TagsResponse = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse model list: {} - Body: {}", e, truncate(body));
        BenchError::Json(e)
    })?;
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

fn parse_reply(body: &str) -> Result<ChatReply> {
    let reply: ChatReply = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse response: {} - Body: {}", e, truncate(body));
        BenchError::Json(e)
    })?;
    reply_or_error(reply)
}

fn reply_or_error(reply: ChatReply) -> Result<ChatReply> {
    match reply.error {
        Some(message) => Err(BenchError::Ollama(message)),
        None => Ok(reply),
    }
}

fn truncate(body: &str) -> &str {
    &body[..floor_char_boundary(body, 500)]
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Splits an NDJSON byte stream into lines; network chunks may end mid-line.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_joins_split_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(br#"{"done":fa"#).is_empty());
        assert_eq!(buf.push(b"lse}\n{\"done\":true}\n"), vec![
            r#"{"done":false}"#.to_string(),
            r#"{"done":true}"#.to_string(),
        ]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_line_buffer_flushes_unterminated_tail() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"\n\n{\"done\":true}").is_empty());
        assert_eq!(buf.finish().as_deref(), Some(r#"{"done":true}"#));
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_chars_intact() {
        let text = "{\"message\":{\"role\":\"assistant\",\"content\":\"é\"}}\n";
        let bytes = text.as_bytes();
        let split = text.find('é').unwrap() + 1;

        let mut buf = LineBuffer::default();
        assert!(buf.push(&bytes[..split]).is_empty());
        let lines = buf.push(&bytes[split..]);
        assert_eq!(lines, vec![text.trim().to_string()]);
    }

    #[test]
    fn test_error_line_becomes_ollama_error() {
        let err = parse_reply(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert!(matches!(err, BenchError::Ollama(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_undecodable_bodies_are_json_errors() {
        assert!(matches!(parse_reply("<html>502</html>"), Err(BenchError::Json(_))));
        assert!(matches!(parse_reply("{\"done\":"), Err(BenchError::Json(_))));
        assert!(matches!(parse_tags("not json"), Err(BenchError::Json(_))));
    }

    #[test]
    fn test_parses_model_tags() {
        let names = parse_tags(r#"{"models":[{"name":"llama3:8b"},{"name":"mistral:7b"}]}"#).unwrap();
        assert_eq!(names, vec!["llama3:8b", "mistral:7b"]);
        assert!(parse_tags("{}").unwrap().is_empty());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let s = "aé";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 500), s.len());
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.host(), "http://localhost:11434");
    }
}
