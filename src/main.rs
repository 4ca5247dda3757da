//! Carga CLI - concurrency load testing for LLM inference endpoints
//!
//! # Commands
//!
//! - `sweep` - Launch a worker and sweep ascending concurrency levels
//! - `load` - Sweep an already-running endpoint
//! - `summary` - Print the summary table from a saved report

use clap::Parser;

use carga::cli::{entrypoint, Cli};
use carga::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    entrypoint(cli).await
}
