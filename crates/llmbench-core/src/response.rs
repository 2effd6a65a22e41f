use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ReplyError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One `/api/chat` object (or stream chunk) exactly as Ollama sent it.
///
/// Streaming chunks before the last one carry only `message` and `done`,
/// so every field is optional here and checked in the parse step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
    /// Set instead of the other fields when Ollama fails mid-request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A completed model reply with its timing and token counters.
///
/// Durations are nanoseconds. `prompt_eval_count` is `None` when Ollama did
/// not report it (usually because the prompt was served from cache, see
/// <https://github.com/ollama/ollama/issues/2068>).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub message: Message,
    pub done: bool,
    pub total_duration: u64,
    pub load_duration: u64,
    pub prompt_eval_count: Option<u64>,
    pub prompt_eval_duration: u64,
    pub eval_count: u64,
    pub eval_duration: u64,
}

impl ResponseRecord {
    /// Prompt tokens with an unmeasured count reported as zero.
    pub fn prompt_tokens(&self) -> u64 {
        self.prompt_eval_count.unwrap_or(0)
    }
}

impl TryFrom<ChatReply> for ResponseRecord {
    type Error = ReplyError;

    fn try_from(reply: ChatReply) -> Result<Self, Self::Error> {
        let created_at = reply
            .created_at
            .ok_or(ReplyError::MissingField("created_at"))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|_| ReplyError::InvalidTimestamp(created_at.clone()))?
            .with_timezone(&Utc);

        let record = Self {
            model: reply.model.ok_or(ReplyError::MissingField("model"))?,
            created_at,
            message: reply.message.ok_or(ReplyError::MissingField("message"))?,
            done: reply.done,
            total_duration: reply
                .total_duration
                .ok_or(ReplyError::MissingField("total_duration"))?,
            load_duration: reply.load_duration.unwrap_or(0),
            prompt_eval_count: reply.prompt_eval_count,
            prompt_eval_duration: reply
                .prompt_eval_duration
                .ok_or(ReplyError::MissingField("prompt_eval_duration"))?,
            eval_count: reply.eval_count.ok_or(ReplyError::MissingField("eval_count"))?,
            eval_duration: reply
                .eval_duration
                .ok_or(ReplyError::MissingField("eval_duration"))?,
        };

        if record.prompt_eval_count.is_none() {
            warn!(
                model = %record.model,
                "prompt token count was not provided, potentially due to prompt caching. \
                 For more info, see https://github.com/ollama/ollama/issues/2068"
            );
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn count_warnings(f: impl FnOnce()) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, f);
        count.load(Ordering::SeqCst)
    }

    fn full_reply() -> serde_json::Value {
        serde_json::json!({
            "model": "test-model",
            "created_at": "2024-06-01T12:00:00.123456789Z",
            "message": { "role": "assistant", "content": "Test response" },
            "done": true,
            "total_duration": 1_000_000_000u64,
            "load_duration": 500_000_000u64,
            "prompt_eval_count": 10,
            "prompt_eval_duration": 200_000_000u64,
            "eval_count": 20,
            "eval_duration": 300_000_000u64
        })
    }

    fn parse(value: serde_json::Value) -> Result<ResponseRecord, ReplyError> {
        let reply: ChatReply = serde_json::from_value(value).unwrap();
        ResponseRecord::try_from(reply)
    }

    #[test]
    fn test_parses_complete_reply() {
        let record = parse(full_reply()).unwrap();
        assert_eq!(record.model, "test-model");
        assert_eq!(record.message.content, "Test response");
        assert!(record.done);
        assert_eq!(record.prompt_eval_count, Some(10));
        assert_eq!(record.load_duration, 500_000_000);
    }

    #[test]
    fn test_missing_prompt_eval_count_is_unmeasured() {
        let mut value = full_reply();
        value.as_object_mut().unwrap().remove("prompt_eval_count");

        let record = parse(value).unwrap();
        assert_eq!(record.prompt_eval_count, None);
        assert_eq!(record.prompt_tokens(), 0);
    }

    #[test]
    fn test_missing_prompt_eval_count_warns_once() {
        let mut value = full_reply();
        value.as_object_mut().unwrap().remove("prompt_eval_count");
        assert_eq!(count_warnings(|| assert!(parse(value).is_ok())), 1);

        assert_eq!(count_warnings(|| assert!(parse(full_reply()).is_ok())), 0);
    }

    #[test]
    fn test_rejected_reply_does_not_warn_about_prompt_count() {
        let mut value = full_reply();
        let fields = value.as_object_mut().unwrap();
        fields.remove("prompt_eval_count");
        fields.remove("eval_count");

        let warnings = count_warnings(|| {
            assert_eq!(parse(value), Err(ReplyError::MissingField("eval_count")));
        });
        assert_eq!(warnings, 0);
    }

    #[test]
    fn test_load_duration_defaults_to_zero() {
        let mut value = full_reply();
        value.as_object_mut().unwrap().remove("load_duration");

        assert_eq!(parse(value).unwrap().load_duration, 0);
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let mut value = full_reply();
        value.as_object_mut().unwrap().remove("eval_duration");

        assert_eq!(parse(value), Err(ReplyError::MissingField("eval_duration")));
    }

    #[test]
    fn test_offset_timestamp_is_normalized_to_utc() {
        let mut value = full_reply();
        value["created_at"] = "2024-06-01T14:00:00+02:00".into();

        let record = parse(value).unwrap();
        assert_eq!(record.created_at.to_rfc3339(), "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let mut value = full_reply();
        value["created_at"] = "yesterday".into();

        assert_eq!(
            parse(value),
            Err(ReplyError::InvalidTimestamp("yesterday".to_string()))
        );
    }

    #[test]
    fn test_intermediate_stream_chunk_deserializes() {
        let chunk: ChatReply =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"Te"},"done":false}"#)
                .unwrap();
        assert!(!chunk.done);
        assert_eq!(chunk.message.unwrap().content, "Te");
        assert!(chunk.eval_count.is_none());
    }
}
