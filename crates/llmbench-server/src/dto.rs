use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub benchmark_id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub benchmarks: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum HealthResponse {
    Healthy {
        status: &'static str,
        ollama_connected: bool,
        models_available: usize,
    },
    Unhealthy {
        status: &'static str,
        ollama_connected: bool,
        error: String,
    },
}

impl HealthResponse {
    pub fn healthy(models_available: usize) -> Self {
        Self::Healthy {
            status: "healthy",
            ollama_connected: true,
            models_available,
        }
    }

    pub fn unhealthy(error: impl ToString) -> Self {
        Self::Unhealthy {
            status: "unhealthy",
            ollama_connected: false,
            error: error.to_string(),
        }
    }
}
