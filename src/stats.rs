//! Latency aggregation and the sweep continuation policy
//!
//! [`aggregate`] reduces one batch of request outcomes to a [`LevelResult`]:
//! success counts, nearest-rank latency percentiles, and cumulative-latency
//! throughput. The function is pure: same outcomes in, same result out.
//!
//! Percentiles use the nearest-rank-by-truncation rule: sort ascending and
//! index at `floor(count * fraction)`. For even counts p50 sits one element
//! above the textbook interpolated median. This is intentional; prior runs
//! were produced with the same rule and results must stay comparable.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::client::RequestOutcome;

/// Number of error strings retained when every request in a batch failed
const ERROR_SAMPLE_LIMIT: usize = 3;

/// Aggregate result for one concurrency level
///
/// Latency and throughput fields are present only when at least one request
/// succeeded; `error_samples` only when none did. Serialized field names are
/// part of the report format and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    /// Concurrency cap this batch ran under
    pub concurrency: usize,
    /// Requests dispatched for this batch
    pub total_requests: usize,
    /// Requests that completed successfully
    pub successful: usize,
    /// Requests that reached a terminal failure
    pub failed: usize,
    /// `successful / total_requests`, denominator is the requested count
    pub success_rate: f64,
    /// Mean latency over successful requests, seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_latency: Option<f64>,
    /// Fastest successful request, seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_latency: Option<f64>,
    /// Slowest successful request, seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_latency: Option<f64>,
    /// Nearest-rank p50 latency, seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50_latency: Option<f64>,
    /// Nearest-rank p90 latency, seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p90_latency: Option<f64>,
    /// Nearest-rank p99 latency, seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99_latency: Option<f64>,
    /// Successful requests per second of cumulative per-request latency.
    /// NOT wall-clock throughput under concurrency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_rps: Option<f64>,
    /// Up to 3 error strings, populated only when no request succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_samples: Option<Vec<String>>,
}

/// Nearest-rank index: truncate `count * fraction` toward zero
fn percentile_index(count: usize, fraction: f64) -> usize {
    ((count as f64 * fraction) as usize).min(count - 1)
}

/// Reduce one batch of outcomes to a [`LevelResult`]
///
/// Pure function: no I/O, inputs untouched, identical calls yield identical
/// results. `success_rate` is computed against `total_requests` as supplied,
/// not the observed outcome count.
#[must_use]
pub fn aggregate(
    outcomes: &[RequestOutcome],
    concurrency: usize,
    total_requests: usize,
) -> LevelResult {
    let mut latencies: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.success)
        .map(|o| o.latency_seconds)
        .collect();
    let successful = latencies.len();
    let failed = outcomes.len() - successful;

    let success_rate = if total_requests > 0 {
        successful as f64 / total_requests as f64
    } else {
        0.0
    };

    if successful == 0 {
        let error_samples: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.success)
            .take(ERROR_SAMPLE_LIMIT)
            .map(|o| o.error.clone().unwrap_or_else(|| "Unknown".to_string()))
            .collect();

        return LevelResult {
            concurrency,
            total_requests,
            successful: 0,
            failed,
            success_rate: 0.0,
            avg_latency: None,
            min_latency: None,
            max_latency: None,
            p50_latency: None,
            p90_latency: None,
            p99_latency: None,
            throughput_rps: None,
            error_samples: Some(error_samples),
        };
    }

    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let sum: f64 = latencies.iter().sum();

    let throughput_rps = if sum > 0.0 {
        successful as f64 / sum
    } else {
        0.0
    };

    LevelResult {
        concurrency,
        total_requests,
        successful,
        failed,
        success_rate,
        avg_latency: Some(sum / successful as f64),
        min_latency: Some(latencies[0]),
        max_latency: Some(latencies[successful - 1]),
        p50_latency: Some(latencies[successful / 2]),
        p90_latency: Some(latencies[percentile_index(successful, 0.9)]),
        p99_latency: Some(latencies[percentile_index(successful, 0.99)]),
        throughput_rps: Some(throughput_rps),
        error_samples: None,
    }
}

/// Threshold guard that stops a sweep once the target is saturated or dead
///
/// Low concurrency levels are always allowed to proceed so that a flaky
/// first batch does not end the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPolicy {
    /// Success rate below which a level counts as failing
    pub min_success_rate: f64,
    /// Levels at or below this concurrency never trigger a stop
    pub grace_concurrency: usize,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            min_success_rate: 0.5,
            grace_concurrency: 10,
        }
    }
}

impl SweepPolicy {
    /// Signal "stop" when the level failed badly enough past the grace zone
    #[must_use]
    pub fn should_stop(&self, result: &LevelResult) -> bool {
        result.success_rate < self.min_success_rate
            && result.concurrency > self.grace_concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(latency: f64) -> RequestOutcome {
        RequestOutcome::ok(latency, 1)
    }

    fn fail(error: &str) -> RequestOutcome {
        RequestOutcome::failed(0.1, error)
    }

    #[test]
    fn test_counts_invariant() {
        let outcomes = vec![ok(0.1), fail("a"), ok(0.2), fail("b")];
        let result = aggregate(&outcomes, 2, 4);
        assert_eq!(result.successful + result.failed, result.total_requests);
        assert_eq!(result.successful, 2);
        assert_eq!(result.failed, 2);
    }

    #[test]
    fn test_all_successful_stats() {
        let outcomes: Vec<RequestOutcome> = (1..=10).map(|i| ok(i as f64 * 0.01)).collect();
        let result = aggregate(&outcomes, 5, 10);

        assert_eq!(result.successful, 10);
        assert!((result.success_rate - 1.0).abs() < 1e-12);
        assert!((result.min_latency.unwrap() - 0.01).abs() < 1e-12);
        assert!((result.max_latency.unwrap() - 0.10).abs() < 1e-12);
        assert!((result.avg_latency.unwrap() - 0.055).abs() < 1e-12);
    }

    #[test]
    fn test_p50_is_truncated_midpoint_not_interpolated_median() {
        // Even count: index 4/2 = 2 selects the third element, one above
        // the interpolated median.
        let outcomes = vec![ok(1.0), ok(2.0), ok(3.0), ok(4.0)];
        let result = aggregate(&outcomes, 1, 4);
        assert_eq!(result.p50_latency, Some(3.0));
    }

    #[test]
    fn test_p90_p99_index_rule_for_ten_samples() {
        let outcomes: Vec<RequestOutcome> = (0..10).map(|i| ok(i as f64)).collect();
        let result = aggregate(&outcomes, 1, 10);
        // floor(10 * 0.9) and floor(10 * 0.99) both land on the last element.
        assert_eq!(result.p90_latency, Some(9.0));
        assert_eq!(result.p99_latency, Some(9.0));
    }

    #[test]
    fn test_p99_index_rule_for_hundred_samples() {
        let outcomes: Vec<RequestOutcome> = (0..100).map(|i| ok(i as f64)).collect();
        let result = aggregate(&outcomes, 1, 100);
        assert_eq!(result.p50_latency, Some(50.0));
        assert_eq!(result.p90_latency, Some(90.0));
        assert_eq!(result.p99_latency, Some(99.0));
    }

    #[test]
    fn test_single_sample_percentiles_all_collapse() {
        let result = aggregate(&[ok(0.25)], 1, 1);
        assert_eq!(result.p50_latency, Some(0.25));
        assert_eq!(result.p90_latency, Some(0.25));
        assert_eq!(result.p99_latency, Some(0.25));
        assert_eq!(result.min_latency, result.max_latency);
    }

    #[test]
    fn test_percentile_ordering() {
        let outcomes: Vec<RequestOutcome> = (0..57).map(|i| ok((i as f64).sin().abs())).collect();
        let result = aggregate(&outcomes, 8, 57);
        let min = result.min_latency.unwrap();
        let p50 = result.p50_latency.unwrap();
        let p90 = result.p90_latency.unwrap();
        let p99 = result.p99_latency.unwrap();
        let max = result.max_latency.unwrap();
        assert!(min <= p50 && p50 <= p90 && p90 <= p99 && p99 <= max);
    }

    #[test]
    fn test_throughput_is_cumulative_latency_rate() {
        // 100 successes at 10ms each: 100 / 1.0s of summed latency.
        let outcomes: Vec<RequestOutcome> = (0..100).map(|_| ok(0.01)).collect();
        let result = aggregate(&outcomes, 10, 100);
        assert!((result.throughput_rps.unwrap() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_throughput_zero_latency_sum() {
        let outcomes = vec![ok(0.0), ok(0.0)];
        let result = aggregate(&outcomes, 1, 2);
        assert_eq!(result.throughput_rps, Some(0.0));
    }

    #[test]
    fn test_all_failed_populates_error_samples_only() {
        let outcomes = vec![fail("e1"), fail("e2"), fail("e3"), fail("e4"), fail("e5")];
        let result = aggregate(&outcomes, 5, 5);

        assert_eq!(result.successful, 0);
        assert_eq!(result.failed, 5);
        assert_eq!(result.success_rate, 0.0);
        assert!(result.avg_latency.is_none());
        assert!(result.throughput_rps.is_none());

        let samples = result.error_samples.unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples, vec!["e1", "e2", "e3"]);
    }

    #[test]
    fn test_all_failed_fewer_than_three_errors() {
        let result = aggregate(&[fail("only")], 1, 1);
        assert_eq!(result.error_samples.unwrap(), vec!["only"]);
    }

    #[test]
    fn test_success_rate_uses_requested_denominator() {
        // Fewer outcomes than requested still divide by the requested total.
        let outcomes = vec![ok(0.1), ok(0.2)];
        let result = aggregate(&outcomes, 2, 10);
        assert!((result.success_rate - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let outcomes = vec![ok(0.3), fail("x"), ok(0.1), ok(0.2)];
        let first = aggregate(&outcomes, 2, 4);
        let second = aggregate(&outcomes, 2, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_outcomes_zero_requests() {
        let result = aggregate(&[], 1, 0);
        assert_eq!(result.success_rate, 0.0);
        assert_eq!(result.error_samples, Some(Vec::new()));
    }

    #[test]
    fn test_policy_stops_on_low_success_past_grace() {
        let outcomes: Vec<RequestOutcome> = (0..10).map(|_| fail("e")).collect();
        let result = aggregate(&outcomes, 200, 10);
        assert!(SweepPolicy::default().should_stop(&result));
    }

    #[test]
    fn test_policy_tolerates_low_success_at_grace_concurrency() {
        let outcomes: Vec<RequestOutcome> = (0..10).map(|_| fail("e")).collect();
        let result = aggregate(&outcomes, 10, 10);
        assert!(!SweepPolicy::default().should_stop(&result));
    }

    #[test]
    fn test_policy_continues_on_healthy_level() {
        let outcomes: Vec<RequestOutcome> = (0..100).map(|_| ok(0.05)).collect();
        let result = aggregate(&outcomes, 200, 100);
        assert!(!SweepPolicy::default().should_stop(&result));
    }

    #[test]
    fn test_level_result_json_field_names() {
        let outcomes = vec![ok(0.1)];
        let result = aggregate(&outcomes, 1, 1);
        let json = serde_json::to_value(&result).unwrap();
        for field in [
            "concurrency",
            "total_requests",
            "successful",
            "failed",
            "success_rate",
            "avg_latency",
            "min_latency",
            "max_latency",
            "p50_latency",
            "p90_latency",
            "p99_latency",
            "throughput_rps",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert!(json.get("error_samples").is_none());
    }
}
