//! Sweep report accumulation, persistence, and console summary
//!
//! One [`SweepReport`] is created per sweep invocation and accumulates a
//! [`LevelResult`] per tested concurrency level. The report must reach disk
//! on every exit path of the sweep (normal completion, policy stop, error);
//! the sweep driver owns that guarantee, this module just makes `save`
//! cheap to call from it.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CargaError, Result};
use crate::stats::LevelResult;

/// Final report for one concurrency sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Unix seconds at report creation
    pub timestamp: u64,
    /// Model identifier the target was serving
    pub model: String,
    /// Run mode metadata ("worker" or "router")
    pub mode: String,
    /// One entry per tested concurrency level, in sweep order
    pub results: Vec<LevelResult>,
}

impl SweepReport {
    /// Create an empty report stamped with the current time
    #[must_use]
    pub fn new(model: &str, mode: &str) -> Self {
        Self {
            timestamp: unix_timestamp(),
            model: model.to_string(),
            mode: mode.to_string(),
            results: Vec::new(),
        }
    }

    /// Append the result for one completed level
    pub fn push(&mut self, result: LevelResult) {
        self.results.push(result);
    }

    /// Write the report as pretty-printed JSON
    ///
    /// # Errors
    /// Returns `FormatError` if encoding fails or `IoError` if the file
    /// cannot be written
    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CargaError::FormatError {
            reason: format!("Failed to encode report: {e}"),
        })?;
        std::fs::write(path, json).map_err(|e| CargaError::IoError {
            message: format!("Failed to write report to {path}: {e}"),
        })?;
        Ok(())
    }

    /// Load a previously saved report
    ///
    /// # Errors
    /// Returns `IoError` if the file cannot be read or `FormatError` if it
    /// does not parse as a report
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| CargaError::IoError {
            message: format!("Failed to read report from {path}: {e}"),
        })?;
        serde_json::from_str(&raw).map_err(|e| CargaError::FormatError {
            reason: format!("Failed to parse report {path}: {e}"),
        })
    }

    /// Print the aligned per-level summary table
    pub fn print_summary(&self) {
        println!("=== Summary ===");
        println!(
            "{:>12} {:>8} {:>12} {:>12} {:>12}",
            "Concurrency", "Success", "Avg Latency", "P90 Latency", "Throughput"
        );
        println!("{}", "-".repeat(70));
        for result in &self.results {
            if result.successful > 0 {
                println!(
                    "{:>12} {:>7.1}% {:>11.3}s {:>11.3}s {:>10.1}/s",
                    result.concurrency,
                    result.success_rate * 100.0,
                    result.avg_latency.unwrap_or(0.0),
                    result.p90_latency.unwrap_or(0.0),
                    result.throughput_rps.unwrap_or(0.0),
                );
            } else {
                println!(
                    "{:>12} {:>7.1}% {:>12} {:>12} {:>12}",
                    result.concurrency,
                    result.success_rate * 100.0,
                    "N/A",
                    "N/A",
                    "N/A",
                );
            }
        }
    }
}

/// Current Unix time in seconds, 0 if the clock is before the epoch
fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
