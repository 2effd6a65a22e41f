use std::sync::Arc;

use dashmap::DashMap;
use llmbench_core::{BenchmarkJob, BenchmarkRequest, DerivedStats, JobStatus};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::model_server::ModelServer;
use crate::runner::{try_benchmark_models, Executor};

struct JobEntry {
    job: BenchmarkJob,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub benchmarks_total: usize,
    pub running: usize,
    pub completed: usize,
    pub error: usize,
}

/// Registry of benchmark jobs, each driven by one background task.
///
/// Entries are only mutated through [`JobStore::update`], which locks the
/// entry's shard. Deleting a job cancels its task, and writes to a deleted
/// id are dropped, so a removed job never reappears.
#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<DashMap<String, JobEntry>>,
    server: Arc<dyn ModelServer>,
}

impl JobStore {
    pub fn new(server: Arc<dyn ModelServer>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            server,
        }
    }

    pub fn server(&self) -> &Arc<dyn ModelServer> {
        &self.server
    }

    /// Registers a running job and starts its task. Must be called inside a tokio runtime.
    pub fn create(&self, request: BenchmarkRequest) -> String {
        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        self.jobs.insert(
            id.clone(),
            JobEntry {
                job: BenchmarkJob::new(&id),
                cancel: cancel.clone(),
            },
        );
        info!(
            benchmark_id = %id,
            prompts = request.prompts.len(),
            skip_models = ?request.skip_models,
            "Benchmark started"
        );

        let store = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(benchmark_id = %task_id, "Benchmark task cancelled");
                }
                _ = store.run(&task_id, request) => {}
            }
        });

        id
    }

    pub fn get(&self, id: &str) -> Option<BenchmarkJob> {
        self.jobs.get(id).map(|entry| entry.job.clone())
    }

    /// Removes the job and stops its task. Returns false for unknown ids.
    pub fn delete(&self, id: &str) -> bool {
        match self.jobs.remove(id) {
            Some((_, entry)) => {
                entry.cancel.cancel();
                info!(benchmark_id = %id, "Benchmark deleted");
                true
            }
            None => false,
        }
    }

    /// Job ids, oldest first.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .jobs
            .iter()
            .map(|entry| (entry.job.created_at, entry.key().clone()))
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn summary(&self) -> JobSummary {
        let mut summary = JobSummary::default();
        for entry in self.jobs.iter() {
            summary.benchmarks_total += 1;
            match entry.job.status {
                JobStatus::Running => summary.running += 1,
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Error => summary.error += 1,
            }
        }
        summary
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut BenchmarkJob)) -> bool {
        match self.jobs.get_mut(id) {
            Some(mut entry) => {
                f(&mut entry.job);
                true
            }
            None => false,
        }
    }

    #[instrument(skip(self, request))]
    async fn run(&self, id: &str, request: BenchmarkRequest) {
        let models = match try_benchmark_models(self.server.as_ref(), &request.skip_models).await {
            Ok(models) => models,
            Err(e) => {
                error!("Benchmark {} failed: {}", id, e);
                self.update(id, |job| job.fail(e.to_string()));
                return;
            }
        };

        let total = models.len() * request.prompts.len();
        self.update(id, |job| job.models_tested = models.clone());

        if total == 0 {
            info!("Nothing to benchmark");
            self.update(id, BenchmarkJob::complete);
            return;
        }

        let executor = Executor::new(self.server.clone());
        let mut completed = 0usize;

        for model in &models {
            if !self.update(id, |job| job.start_model(model)) {
                return;
            }

            for prompt in &request.prompts {
                match executor.run(model, prompt, request.verbose).await {
                    Some(response) => {
                        let stats = DerivedStats::from_response(&response);
                        self.update(id, |job| job.record(model, stats));
                    }
                    None => warn!(model = %model, prompt = %prompt, "Skipping failed run"),
                }

                completed += 1;
                let progress = completed as f64 / total as f64;
                if !self.update(id, |job| job.progress = progress) {
                    return;
                }
            }
        }

        self.update(id, BenchmarkJob::complete);
        info!("Benchmark completed");
    }
}
