use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Ollama error: {0}")]
    Ollama(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid reply: {0}")]
    Reply(#[from] ReplyError),

    #[error("No response received from Ollama")]
    NoResponse,

    #[error("Config error: {0}")]
    Config(String),
}

/// Reasons a chat reply cannot become a [`crate::ResponseRecord`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid created_at timestamp `{0}`")]
    InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, BenchError>;
