use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DerivedStats;

pub const DEFAULT_PROMPTS: &[&str] = &[
    "Why is the sky blue?",
    "Write a report on the financials of Apple Inc.",
];

pub fn default_prompts() -> Vec<String> {
    DEFAULT_PROMPTS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    #[serde(default = "default_prompts")]
    pub prompts: Vec<String>,
    #[serde(default)]
    pub skip_models: Vec<String>,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for BenchmarkRequest {
    fn default() -> Self {
        Self {
            prompts: default_prompts(),
            skip_models: Vec::new(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Snapshot of one HTTP-triggered benchmark over a model x prompt matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkJob {
    pub benchmark_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub models_tested: Vec<String>,
    pub current_model: Option<String>,
    /// Keyed by model name, serialized in sorted order.
    pub results: BTreeMap<String, Vec<DerivedStats>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BenchmarkJob {
    pub fn new(benchmark_id: impl Into<String>) -> Self {
        Self {
            benchmark_id: benchmark_id.into(),
            status: JobStatus::Running,
            progress: 0.0,
            models_tested: Vec::new(),
            current_model: None,
            results: BTreeMap::new(),
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn start_model(&mut self, model: &str) {
        self.current_model = Some(model.to_string());
        self.results.entry(model.to_string()).or_default();
    }

    pub fn record(&mut self, model: &str, stats: DerivedStats) {
        self.results.entry(model.to_string()).or_default().push(stats);
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.current_model = None;
        self.completed_at = Some(Utc::now());
    }

    /// Partial results are discarded on failure.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Error;
        self.error_message = Some(message.into());
        self.results.clear();
        self.completed_at = Some(Utc::now());
    }
}
