//! Bounded-concurrency load driver
//!
//! Dispatches a fixed number of generation requests against a target URL
//! with a hard cap on simultaneous in-flight requests. The cap is enforced
//! by a counting semaphore: a task holds a permit for the full lifetime of
//! its request, so a saturated gate blocks further dispatch until a slot
//! frees. The driver returns only after every dispatched request has
//! reached a terminal outcome.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::client::{GenerateClient, GeneratePayload, RequestOutcome};

/// Progress is reported every this many completed requests
const PROGRESS_INTERVAL: usize = 10;

/// Configuration for one load-test batch at a single concurrency level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Maximum simultaneous in-flight requests
    pub concurrency: usize,
    /// Total requests to dispatch for this batch
    pub total_requests: usize,
    /// Whether to print per-batch progress lines
    pub show_progress: bool,
}

impl LevelConfig {
    /// Config for a sweep level: at least 100 requests, and at least as
    /// many as the concurrency cap so the gate actually saturates
    #[must_use]
    pub fn for_level(concurrency: usize) -> Self {
        Self {
            concurrency,
            total_requests: concurrency.max(100),
            show_progress: true,
        }
    }

    /// Explicit request count, for callers that do not follow the sweep rule
    #[must_use]
    pub fn with_requests(concurrency: usize, total_requests: usize) -> Self {
        Self {
            concurrency,
            total_requests,
            show_progress: false,
        }
    }

    /// Validate the configuration
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.concurrency >= 1 && self.total_requests >= 1
    }
}

/// Run one batch of requests with at most `config.concurrency` in flight
///
/// Outcomes are collected in completion order, not dispatch order; callers
/// must treat the returned sequence as a multiset. A single request failure
/// never aborts the batch: the returned vector always holds exactly
/// `config.total_requests` outcomes.
pub async fn run_level(
    client: &GenerateClient,
    url: &str,
    config: &LevelConfig,
    payload: &GeneratePayload,
) -> Vec<RequestOutcome> {
    // The gate must admit at least one request or the batch would deadlock.
    let permits = config.concurrency.max(1);
    let gate = Arc::new(Semaphore::new(permits));

    let mut tasks = JoinSet::new();
    for _ in 0..config.total_requests {
        let gate = Arc::clone(&gate);
        let client = client.clone();
        let url = url.to_string();
        let payload = payload.clone();
        tasks.spawn(async move {
            let _permit = gate
                .acquire_owned()
                .await
                .expect("admission gate closed while tasks in flight");
            client.generate(&url, &payload).await
        });
    }

    let mut outcomes = Vec::with_capacity(config.total_requests);
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            // A panicked task still counts as a terminal failure so the
            // batch keeps its exact request count.
            Err(e) => RequestOutcome::failed(0.0, &format!("request task failed: {e}")),
        };
        outcomes.push(outcome);
        if config.show_progress && outcomes.len() % PROGRESS_INTERVAL == 0 {
            println!("  Progress: {}/{}", outcomes.len(), config.total_requests);
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_level_small_concurrency_floors_at_100() {
        let config = LevelConfig::for_level(10);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.total_requests, 100);
    }

    #[test]
    fn test_for_level_large_concurrency_matches_cap() {
        let config = LevelConfig::for_level(5000);
        assert_eq!(config.total_requests, 5000);
    }

    #[test]
    fn test_for_level_boundary() {
        assert_eq!(LevelConfig::for_level(100).total_requests, 100);
        assert_eq!(LevelConfig::for_level(101).total_requests, 101);
        assert_eq!(LevelConfig::for_level(99).total_requests, 100);
    }

    #[test]
    fn test_is_valid_rejects_zero_concurrency() {
        let config = LevelConfig::with_requests(0, 10);
        assert!(!config.is_valid());
    }

    #[test]
    fn test_is_valid_rejects_zero_requests() {
        let config = LevelConfig::with_requests(4, 0);
        assert!(!config.is_valid());
    }

    #[test]
    fn test_with_requests_disables_progress() {
        let config = LevelConfig::with_requests(4, 20);
        assert!(!config.show_progress);
        assert!(config.is_valid());
    }
}
