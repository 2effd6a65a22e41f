use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use llmbench_benchmark::{try_benchmark_models, JobSummary};
use llmbench_core::{BenchmarkJob, BenchmarkRequest};
use tracing::error;

use crate::dto::{
    DeleteResponse, HealthResponse, ListResponse, ModelsResponse, RootResponse, StartResponse,
};
use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/models", get(models))
        .route("/benchmark", post(start_benchmark))
        .route("/benchmark/{id}", get(get_benchmark).delete(delete_benchmark))
        .route("/benchmarks", get(list_benchmarks))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "LLM Benchmark API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn models(State(state): State<Arc<AppState>>) -> Result<Json<ModelsResponse>, AppError> {
    let models = try_benchmark_models(state.server(), &[]).await.map_err(|e| {
        error!("Error fetching models: {}", e);
        AppError::from(e)
    })?;
    Ok(Json(ModelsResponse { models }))
}

async fn start_benchmark(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BenchmarkRequest>,
) -> Json<StartResponse> {
    let benchmark_id = state.jobs.create(req);
    Json(StartResponse {
        benchmark_id,
        status: "started",
    })
}

async fn get_benchmark(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BenchmarkJob>, AppError> {
    state
        .jobs
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Benchmark not found".to_string()))
}

async fn list_benchmarks(State(state): State<Arc<AppState>>) -> Json<ListResponse> {
    Json(ListResponse {
        benchmarks: state.jobs.list(),
    })
}

async fn delete_benchmark(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    if !state.jobs.delete(&id) {
        return Err(AppError::NotFound("Benchmark not found".to_string()));
    }
    Ok(Json(DeleteResponse {
        message: "Benchmark deleted",
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    match state.server().list_models().await {
        Ok(models) => Json(HealthResponse::healthy(models.len())),
        Err(e) => Json(HealthResponse::unhealthy(e)),
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<JobSummary> {
    Json(state.jobs.summary())
}
