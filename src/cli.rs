//! CLI command implementations
//!
//! This module contains the clap surface and all the business logic for
//! CLI commands, extracted from main.rs for testability.

use clap::{Parser, Subcommand};

use crate::error::{CargaError, Result};
use crate::report::SweepReport;
use crate::server::{kill_stray_workers, LaunchMode, WorkerConfig, WorkerSupervisor};
use crate::sweep::{SweepConfig, SweepRunner};

/// Command-line name filter for stray serving processes
const STRAY_PROCESS_FILTER: &str = "sglang";

/// Carga - concurrency load testing for LLM inference endpoints
///
/// Launches a serving process (or targets a running one), issues
/// concurrent generation requests at ascending concurrency levels, and
/// records latency and throughput statistics to a JSON report.
#[derive(Debug, Parser)]
#[command(name = "carga")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Launch a worker and sweep ascending concurrency levels against it
    ///
    /// Examples:
    ///   carga sweep --model qwen/qwen2.5-0.5b-instruct
    ///   carga sweep --dp-size 4 --output router_results.json
    Sweep {
        /// Model path or identifier to serve
        #[arg(long, default_value = "qwen/qwen2.5-0.5b-instruct")]
        model: String,

        /// Port the launched server binds
        #[arg(long, default_value_t = 31000)]
        port: u16,

        /// Output file for the JSON report
        #[arg(long, default_value = "concurrency_results.json")]
        output: String,

        /// Comma-separated concurrency ladder override
        #[arg(long)]
        levels: Option<String>,

        /// Launch a router fronting this many data-parallel workers
        /// instead of a single worker
        #[arg(long)]
        dp_size: Option<usize>,

        /// Skip killing stray serving processes before launch
        #[arg(long, default_value_t = false)]
        keep_existing: bool,
    },
    /// Sweep an already-running endpoint without managing its process
    ///
    /// Examples:
    ///   carga load --url http://127.0.0.1:31000
    ///   carga load --url http://10.0.0.5:8000 --levels 10,50,100
    Load {
        /// Base URL of the running server
        #[arg(long, default_value = "http://127.0.0.1:31000")]
        url: String,

        /// Model identifier recorded in the report
        #[arg(long, default_value = "unknown")]
        model: String,

        /// Output file for the JSON report
        #[arg(long, default_value = "concurrency_results.json")]
        output: String,

        /// Comma-separated concurrency ladder override
        #[arg(long)]
        levels: Option<String>,
    },
    /// Print the summary table from a saved report
    Summary {
        /// Report file to read
        #[arg(value_name = "FILE")]
        file: String,
    },
}

/// Main CLI entrypoint - dispatches commands to their implementations
pub async fn entrypoint(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sweep {
            model,
            port,
            output,
            levels,
            dp_size,
            keep_existing,
        } => {
            run_sweep_command(&model, port, &output, levels.as_deref(), dp_size, keep_existing)
                .await
        },
        Commands::Load {
            url,
            model,
            output,
            levels,
        } => run_load_command(&url, &model, &output, levels.as_deref()).await,
        Commands::Summary { file } => run_summary_command(&file),
    }
}

/// Parse a comma-separated concurrency ladder
fn parse_levels(raw: &str) -> Result<Vec<usize>> {
    let levels: Vec<usize> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| {
            CargaError::InvalidConfiguration(format!("invalid concurrency ladder '{raw}': {e}"))
        })?;
    if levels.is_empty() {
        return Err(CargaError::InvalidConfiguration(format!(
            "empty concurrency ladder '{raw}'"
        )));
    }
    Ok(levels)
}

/// Build a sweep config from CLI arguments
fn sweep_config(model: &str, output: &str, levels: Option<&str>) -> Result<SweepConfig> {
    let mut config = SweepConfig {
        model: model.to_string(),
        output_path: output.to_string(),
        ..SweepConfig::default()
    };
    if let Some(raw) = levels {
        config.levels = parse_levels(raw)?;
    }
    Ok(config)
}

/// Full orchestration: cleanup, launch, sweep, teardown
pub async fn run_sweep_command(
    model: &str,
    port: u16,
    output: &str,
    levels: Option<&str>,
    dp_size: Option<usize>,
    keep_existing: bool,
) -> Result<()> {
    // Validate the ladder before any process is launched.
    let runner = SweepRunner::new(sweep_config(model, output, levels)?);

    if !keep_existing {
        kill_stray_workers(STRAY_PROCESS_FILTER);
    }

    let mode = dp_size.map_or(LaunchMode::Worker, |n| LaunchMode::Router { dp_size: n });
    let worker_config = WorkerConfig {
        model_path: model.to_string(),
        port,
        mode: mode.clone(),
        ..WorkerConfig::default()
    };
    let generate_url = worker_config.generate_url();
    let base_url = worker_config.base_url();

    let supervisor = WorkerSupervisor::new(worker_config);
    let handle = supervisor.start().await?;

    let outcome = runner.run(&generate_url, &base_url, mode.as_str()).await;

    // Teardown runs whether or not the sweep succeeded.
    let stopped = supervisor.stop(handle).await;
    outcome?;
    stopped?;
    Ok(())
}

/// Sweep a running endpoint; no process management
pub async fn run_load_command(
    url: &str,
    model: &str,
    output: &str,
    levels: Option<&str>,
) -> Result<()> {
    let base_url = url.trim_end_matches('/').to_string();
    let generate_url = format!("{base_url}/generate");

    let runner = SweepRunner::new(sweep_config(model, output, levels)?);
    runner.run(&generate_url, &base_url, "external").await?;
    Ok(())
}

/// Load a saved report and print its summary table
pub fn run_summary_command(path: &str) -> Result<()> {
    let report = SweepReport::load(path)?;
    println!("Model: {}", report.model);
    println!("Mode: {}", report.mode);
    println!("Timestamp: {}", report.timestamp);
    println!();
    report.print_summary();
    Ok(())
}
