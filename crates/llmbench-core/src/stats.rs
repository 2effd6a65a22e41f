use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Message, ResponseRecord};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

pub fn nanos_to_secs(nanos: u64) -> f64 {
    nanos as f64 / NANOS_PER_SEC
}

/// Throughput and timing figures derived from one [`ResponseRecord`].
///
/// Rates are not guarded against zero durations: a zero denominator gives
/// `inf` or `NaN`, which serializes to JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub model: String,
    pub prompt_tokens_per_sec: f64,
    pub response_tokens_per_sec: f64,
    pub total_tokens_per_sec: f64,
    pub prompt_tokens: u64,
    /// False when Ollama did not report a prompt token count.
    pub prompt_tokens_measured: bool,
    pub response_tokens: u64,
    pub model_load_seconds: f64,
    pub prompt_eval_seconds: f64,
    pub response_eval_seconds: f64,
    pub total_seconds: f64,
}

impl DerivedStats {
    pub fn from_response(response: &ResponseRecord) -> Self {
        let prompt_tokens = response.prompt_tokens();
        let prompt_secs = nanos_to_secs(response.prompt_eval_duration);
        let eval_secs = nanos_to_secs(response.eval_duration);
        let combined_secs = prompt_secs + eval_secs;
        let combined_tokens = prompt_tokens as f64 + response.eval_count as f64;

        Self {
            model: response.model.clone(),
            prompt_tokens_per_sec: prompt_tokens as f64 / prompt_secs,
            response_tokens_per_sec: response.eval_count as f64 / eval_secs,
            total_tokens_per_sec: combined_tokens / combined_secs,
            prompt_tokens,
            prompt_tokens_measured: response.prompt_eval_count.is_some(),
            response_tokens: response.eval_count,
            model_load_seconds: nanos_to_secs(response.load_duration),
            prompt_eval_seconds: prompt_secs,
            response_eval_seconds: eval_secs,
            total_seconds: nanos_to_secs(response.total_duration),
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prompt_tokens = if self.prompt_tokens_measured {
            self.prompt_tokens.to_string()
        } else {
            format!("{} (not reported)", self.prompt_tokens)
        };

        writeln!(f, "----------------------------------------------------")?;
        writeln!(f, "        {}", self.model)?;
        writeln!(f, "        \tPrompt eval: {:.2} t/s", self.prompt_tokens_per_sec)?;
        writeln!(f, "        \tResponse: {:.2} t/s", self.response_tokens_per_sec)?;
        writeln!(f, "        \tTotal: {:.2} t/s", self.total_tokens_per_sec)?;
        writeln!(f)?;
        writeln!(f, "        Stats:")?;
        writeln!(f, "        \tPrompt tokens: {}", prompt_tokens)?;
        writeln!(f, "        \tResponse tokens: {}", self.response_tokens)?;
        writeln!(f, "        \tModel load time: {:.2}s", self.model_load_seconds)?;
        writeln!(f, "        \tPrompt eval time: {:.2}s", self.prompt_eval_seconds)?;
        writeln!(f, "        \tResponse time: {:.2}s", self.response_eval_seconds)?;
        writeln!(f, "        \tTotal time: {:.2}s", self.total_seconds)?;
        write!(f, "----------------------------------------------------")
    }
}

fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

/// Sums the counters of several runs of one model into a synthetic record.
///
/// Converting the result with [`DerivedStats::from_response`] gives the
/// average throughput as sum-of-counts over sum-of-durations, not as a mean
/// of per-run rates. Returns `None` when there is nothing to average.
pub fn aggregate(responses: &[ResponseRecord]) -> Option<ResponseRecord> {
    let Some(first) = responses.first() else {
        warn!("No stats to average");
        return None;
    };

    let measured_prompts: Vec<u64> = responses
        .iter()
        .filter_map(|r| r.prompt_eval_count)
        .collect();
    let prompt_eval_count = if measured_prompts.is_empty() {
        None
    } else {
        Some(saturating_sum(measured_prompts.into_iter()))
    };

    Some(ResponseRecord {
        model: first.model.clone(),
        created_at: Utc::now(),
        message: Message {
            role: "system".to_string(),
            content: format!("Average stats across {} runs", responses.len()),
        },
        done: true,
        total_duration: saturating_sum(responses.iter().map(|r| r.total_duration)),
        load_duration: saturating_sum(responses.iter().map(|r| r.load_duration)),
        prompt_eval_count,
        prompt_eval_duration: saturating_sum(responses.iter().map(|r| r.prompt_eval_duration)),
        eval_count: saturating_sum(responses.iter().map(|r| r.eval_count)),
        eval_duration: saturating_sum(responses.iter().map(|r| r.eval_duration)),
    })
}

/// Averaged statistics for a set of runs, or `None` if there were none.
pub fn average_stats(responses: &[ResponseRecord]) -> Option<DerivedStats> {
    aggregate(responses).map(|r| DerivedStats::from_response(&r))
}
