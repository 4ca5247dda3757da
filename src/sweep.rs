//! Concurrency sweep driver
//!
//! Walks an ascending ladder of concurrency levels against one target URL,
//! aggregating a [`LevelResult`] per level into a [`SweepReport`]. The
//! report reaches disk on every exit path: normal completion, a policy
//! stop, a failed health re-check, or a mid-sweep error. Partial sweep
//! data is never silently lost.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::client::{GenerateClient, GeneratePayload};
use crate::error::{CargaError, Result};
use crate::load::{run_level, LevelConfig};
use crate::report::SweepReport;
use crate::stats::{aggregate, LevelResult, SweepPolicy};

/// Default ascending concurrency ladder
pub const DEFAULT_CONCURRENCY_LEVELS: &[usize] = &[
    10, 20, 50, 100, 200, 1000, 2000, 5000, 10_000, 30_000, 50_000,
];

/// Configuration for one sweep run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Concurrency levels to test, in order
    pub levels: Vec<usize>,
    /// Model identifier recorded in the report
    pub model: String,
    /// Where the JSON report is written
    pub output_path: String,
    /// Stop-early policy evaluated after every level
    pub policy: SweepPolicy,
    /// Concurrent warmup requests issued before the first level
    pub warmup_requests: usize,
    /// Whether to re-probe the health endpoint before each level
    pub check_health: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_CONCURRENCY_LEVELS.to_vec(),
            model: "qwen/qwen2.5-0.5b-instruct".to_string(),
            output_path: "concurrency_results.json".to_string(),
            policy: SweepPolicy::default(),
            warmup_requests: 10,
            check_health: true,
        }
    }
}

/// Runs a configured sweep against a target endpoint
#[derive(Debug)]
pub struct SweepRunner {
    config: SweepConfig,
    client: GenerateClient,
}

impl SweepRunner {
    /// Create a runner for the given sweep configuration
    #[must_use]
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            client: GenerateClient::new(),
        }
    }

    /// Sweep configuration this runner executes
    #[must_use]
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run the full sweep and return the finished report
    ///
    /// The report is saved to the configured output path before any error
    /// from the level loop propagates, so partial data survives every
    /// termination path.
    ///
    /// # Errors
    /// Returns the first mid-sweep error, or the save error if only the
    /// save failed
    pub async fn run(
        &self,
        generate_url: &str,
        base_url: &str,
        mode: &str,
    ) -> Result<SweepReport> {
        let mut report = SweepReport::new(&self.config.model, mode);
        let outcome = self.run_levels(generate_url, base_url, &mut report).await;

        let saved = report.save(&self.config.output_path);
        if saved.is_ok() {
            println!();
            println!("Results saved to {}", self.config.output_path);
        }
        println!();
        report.print_summary();

        outcome?;
        saved?;
        Ok(report)
    }

    /// Walk the ladder; pushes one result per completed level
    async fn run_levels(
        &self,
        generate_url: &str,
        base_url: &str,
        report: &mut SweepReport,
    ) -> Result<()> {
        self.warmup(generate_url).await;
        let payload = GeneratePayload::standard();

        for &concurrency in &self.config.levels {
            if self.config.check_health && !self.client.check_health(base_url).await {
                println!("Worker not responding, stopping tests");
                break;
            }

            let level = LevelConfig::for_level(concurrency);
            if !level.is_valid() {
                return Err(CargaError::InvalidConfiguration(format!(
                    "invalid concurrency level {concurrency}"
                )));
            }

            println!();
            println!("=== Testing Concurrency: {concurrency} ===");
            println!(
                "Testing with {} total requests for concurrency level {concurrency}.",
                level.total_requests
            );

            let outcomes = run_level(&self.client, generate_url, &level, &payload).await;
            let result = aggregate(&outcomes, concurrency, level.total_requests);
            print_level(&result);

            let stop = self.config.policy.should_stop(&result);
            report.push(result);
            if stop {
                println!();
                println!("Stopping tests due to low success rate");
                break;
            }
        }

        Ok(())
    }

    /// Fire a small batch of concurrent warmup requests; outcomes discarded
    async fn warmup(&self, generate_url: &str) {
        if self.config.warmup_requests == 0 {
            return;
        }
        println!("Warming up...");
        let payload = GeneratePayload::warmup();
        let requests = (0..self.config.warmup_requests)
            .map(|_| self.client.generate(generate_url, &payload));
        let _ = join_all(requests).await;
    }
}

/// Per-level console lines, printed as soon as the level finishes
fn print_level(result: &LevelResult) {
    println!("  Success rate: {:.1}%", result.success_rate * 100.0);
    if result.successful > 0 {
        println!("  Avg latency: {:.3}s", result.avg_latency.unwrap_or(0.0));
        println!("  P90 latency: {:.3}s", result.p90_latency.unwrap_or(0.0));
        println!(
            "  Throughput: {:.1} req/s",
            result.throughput_rps.unwrap_or(0.0)
        );
    }
}
