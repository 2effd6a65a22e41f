pub mod config;
pub mod error;
pub mod job;
pub mod response;
pub mod stats;

pub use config::{BenchConfig, OllamaConfig, ServerConfig};
pub use error::{BenchError, ReplyError, Result};
pub use job::{default_prompts, BenchmarkJob, BenchmarkRequest, JobStatus, DEFAULT_PROMPTS};
pub use response::{ChatReply, Message, ResponseRecord};
pub use stats::{aggregate, average_stats, nanos_to_secs, DerivedStats};
