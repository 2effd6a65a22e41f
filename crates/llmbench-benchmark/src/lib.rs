pub mod jobs;
pub mod model_server;
pub mod ollama;
pub mod runner;

#[cfg(test)]
mod testing;

pub use jobs::{JobStore, JobSummary};
pub use model_server::{ChatStream, ModelServer};
pub use ollama::OllamaClient;
pub use runner::{benchmark_models, try_benchmark_models, Executor};
