//! # Carga
//!
//! Concurrency-sweep load testing and latency measurement for LLM
//! inference endpoints.
//!
//! Carga (Spanish: "load") launches a serving process (a single worker or
//! a router fronting data-parallel workers), issues concurrent generation
//! requests at ascending concurrency levels, and records latency and
//! throughput statistics to a JSON report.
//!
//! ## Architecture
//!
//! - [`client`]: HTTP client issuing generation requests and health probes,
//!   classifying every response into a terminal [`client::RequestOutcome`]
//! - [`load`]: bounded-concurrency driver; a counting semaphore caps
//!   simultaneous in-flight requests and a join barrier holds the batch
//!   open until every request terminates
//! - [`stats`]: pure aggregation of one batch into a [`stats::LevelResult`]
//!   with nearest-rank latency percentiles, plus the sweep stop policy
//! - [`sweep`]: walks the concurrency ladder, persisting the report on
//!   every exit path
//! - [`server`]: lifecycle of the serving process under test
//! - [`report`]: report accumulation, JSON persistence, console summary
//!
//! ## Example
//!
//! ```rust,no_run
//! use carga::client::{GenerateClient, GeneratePayload};
//! use carga::load::{run_level, LevelConfig};
//! use carga::stats::aggregate;
//!
//! # async fn demo() {
//! let client = GenerateClient::new();
//! let config = LevelConfig::for_level(10);
//! let outcomes = run_level(
//!     &client,
//!     "http://127.0.0.1:31000/generate",
//!     &config,
//!     &GeneratePayload::standard(),
//! )
//! .await;
//! let result = aggregate(&outcomes, config.concurrency, config.total_requests);
//! println!("p90 latency: {:?}", result.p90_latency);
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f64 for statistics is safe
#![allow(clippy::cast_possible_truncation)] // percentile indexing truncates on purpose
#![allow(clippy::cast_sign_loss)] // count * fraction is never negative
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)] // Prefer explicit format args
#![allow(clippy::must_use_candidate)]

pub mod client;
/// CLI command implementations (extracted for testability)
pub mod cli;
pub mod error;
pub mod load;
pub mod report;
pub mod server;
pub mod stats;
pub mod sweep;

pub use client::{GenerateClient, GeneratePayload, RequestOutcome, SamplingParams};
pub use error::{CargaError, Result};
pub use load::{run_level, LevelConfig};
pub use report::SweepReport;
pub use server::{kill_stray_workers, LaunchMode, WorkerConfig, WorkerSupervisor};
pub use stats::{aggregate, LevelResult, SweepPolicy};
pub use sweep::{SweepConfig, SweepRunner, DEFAULT_CONCURRENCY_LEVELS};
