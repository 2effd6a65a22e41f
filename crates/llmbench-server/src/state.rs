use std::sync::Arc;

use llmbench_benchmark::{JobStore, ModelServer};

pub struct AppState {
    pub jobs: JobStore,
}

impl AppState {
    pub fn new(server: Arc<dyn ModelServer>) -> Self {
        Self {
            jobs: JobStore::new(server),
        }
    }

    pub fn server(&self) -> &dyn ModelServer {
        self.jobs.server().as_ref()
    }
}
