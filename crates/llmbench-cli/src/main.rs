use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use llmbench_benchmark::{benchmark_models, Executor, ModelServer, OllamaClient};
use llmbench_core::{
    average_stats, config::normalize_host, default_prompts, BenchConfig, DerivedStats, ResponseRecord,
};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "llmbench")]
#[command(about = "Run benchmarks on your Ollama models.", long_about = None)]
struct Cli {
    /// Stream responses and print per-run statistics
    #[arg(short, long)]
    verbose: bool,

    /// Model names to skip, separated by spaces
    #[arg(short, long, num_args = 0.., value_name = "MODEL")]
    skip_models: Vec<String>,

    /// Prompts to benchmark with, separated by spaces
    #[arg(short, long, num_args = 0.., value_name = "PROMPT", default_values_t = default_prompts())]
    prompts: Vec<String>,

    /// Ollama host URL (defaults to $OLLAMA_HOST or http://localhost:11434)
    #[arg(long)]
    ollama_host: Option<String>,

    /// Output format for the averaged results
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

impl Cli {
    /// Command-line flags win over the environment.
    fn apply_overrides(&self, config: &mut BenchConfig) {
        if let Some(host) = &self.ollama_host {
            config.ollama.host = normalize_host(host);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Serialize)]
struct ModelReport {
    model: String,
    runs: Vec<DerivedStats>,
    average: Option<DerivedStats>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = BenchConfig::from_env()?;
    cli.apply_overrides(&mut config);

    info!(
        verbose = cli.verbose,
        skip_models = ?cli.skip_models,
        prompts = ?cli.prompts,
        host = %config.ollama.host,
        "Starting benchmark"
    );

    let server: Arc<dyn ModelServer> = Arc::new(OllamaClient::from_config(&config.ollama)?);
    let (tx, mut tokens) = mpsc::unbounded_channel();
    let executor = Executor::new(server.clone()).with_token_sink(tx);

    let models = benchmark_models(server.as_ref(), &cli.skip_models).await;
    let mut benchmarks: Vec<(String, Vec<ResponseRecord>)> = Vec::with_capacity(models.len());

    for model in models {
        let mut responses = Vec::with_capacity(cli.prompts.len());

        for prompt in &cli.prompts {
            if cli.verbose {
                info!("Benchmarking: {} - Prompt: {}", model, prompt);
            }

            let run = executor.run(&model, prompt, cli.verbose);
            let Some(response) = print_while_running(run, &mut tokens).await else {
                continue;
            };

            if cli.verbose {
                println!();
                info!("Response: {}", response.message.content);
                if cli.output == OutputFormat::Table {
                    println!("{}", DerivedStats::from_response(&response));
                }
            }
            responses.push(response);
        }

        benchmarks.push((model, responses));
    }

    match cli.output {
        OutputFormat::Json => print_json(&benchmarks)?,
        OutputFormat::Table => print_table(&benchmarks),
    }

    Ok(())
}

/// Prints streamed tokens while `run` is in flight, keeping them ahead of
/// whatever the caller prints next.
async fn print_while_running<F>(run: F, tokens: &mut UnboundedReceiver<String>) -> Option<ResponseRecord>
where
    F: std::future::Future<Output = Option<ResponseRecord>>,
{
    tokio::pin!(run);
    let response = loop {
        tokio::select! {
            biased;
            Some(token) = tokens.recv() => print_token(&token),
            response = &mut run => break response,
        }
    };

    while let Ok(token) = tokens.try_recv() {
        print_token(&token);
    }
    response
}

fn print_token(token: &str) {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "{}", token);
    let _ = stdout.flush();
}

fn print_table(benchmarks: &[(String, Vec<ResponseRecord>)]) {
    for (model, responses) in benchmarks {
        let Some(average) = average_stats(responses) else {
            info!(model = %model, "No successful runs");
            continue;
        };
        info!("Average stats:");
        println!("{}", average);
        println!();
    }
}

fn print_json(benchmarks: &[(String, Vec<ResponseRecord>)]) -> Result<()> {
    let reports: Vec<ModelReport> = benchmarks
        .iter()
        .map(|(model, responses)| ModelReport {
            model: model.clone(),
            runs: responses.iter().map(DerivedStats::from_response).collect(),
            average: average_stats(responses),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
