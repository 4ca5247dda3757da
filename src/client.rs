//! HTTP client for the generation endpoint under test
//!
//! Issues real POST requests against a serving endpoint and classifies each
//! response into a terminal [`RequestOutcome`]. Classification rules:
//!
//! - 200 with a JSON body: success, token count estimated from the `text` field
//! - 200 with a non-JSON body: failure, records the declared content-type
//! - non-200 status: failure, records status code and reason phrase
//! - transport fault (timeout, reset, DNS): failure, truncated fault text
//!
//! Every outcome carries the wall-clock latency from dispatch to the point
//! where the request reached its terminal state, including failures.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Total per-request timeout covering connect, send, and response body
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Health probes use a much tighter timeout than generation requests
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Recorded error strings are capped at this many characters
const MAX_ERROR_LEN: usize = 100;

/// Sampling parameters sent with every generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Maximum number of new tokens to generate
    pub max_new_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Request body for the generation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratePayload {
    /// Prompt text
    pub text: String,
    /// Sampling parameters
    pub sampling_params: SamplingParams,
}

impl GeneratePayload {
    /// Standard load-test payload: short fixed prompt, 10 new tokens
    #[must_use]
    pub fn standard() -> Self {
        Self {
            text: "Once upon a time".to_string(),
            sampling_params: SamplingParams {
                max_new_tokens: 10,
                temperature: 0.7,
            },
        }
    }

    /// Warmup payload: minimal generation to prime the server before a sweep
    #[must_use]
    pub fn warmup() -> Self {
        Self {
            text: "Hello".to_string(),
            sampling_params: SamplingParams {
                max_new_tokens: 5,
                temperature: 0.7,
            },
        }
    }
}

/// Terminal outcome of one dispatched request
///
/// Produced exactly once per request and immutable afterwards. A failed
/// request carries a truncated error description; a successful one carries
/// an estimated token count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// Whether the request completed with a valid response
    pub success: bool,
    /// Wall-clock seconds from dispatch to terminal state
    pub latency_seconds: f64,
    /// Estimated tokens in the generated text (0 when unknown)
    #[serde(default)]
    pub tokens: usize,
    /// Error description for failed requests, capped at 100 characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestOutcome {
    /// Successful outcome with measured latency and estimated token count
    #[must_use]
    pub fn ok(latency_seconds: f64, tokens: usize) -> Self {
        Self {
            success: true,
            latency_seconds,
            tokens,
            error: None,
        }
    }

    /// Failed outcome; the error string is truncated to 100 characters
    #[must_use]
    pub fn failed(latency_seconds: f64, error: &str) -> Self {
        Self {
            success: false,
            latency_seconds,
            tokens: 0,
            error: Some(truncate_error(error)),
        }
    }
}

/// Cap an error description at `MAX_ERROR_LEN` characters
fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// Estimate generated tokens as the whitespace-token count of the `text`
/// field, or 0 when the field is absent or not a string
fn estimate_tokens(body: &Value) -> usize {
    body.get("text")
        .and_then(Value::as_str)
        .map_or(0, |text| text.split_whitespace().count())
}

/// HTTP client for generation requests and health probes
#[derive(Debug, Clone)]
pub struct GenerateClient {
    client: reqwest::Client,
}

impl Default for GenerateClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerateClient {
    /// Create a new client; timeouts are applied per request
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Issue one generation request and classify the result
    ///
    /// Never returns an error: every fault becomes a failed outcome so that
    /// a single request can never abort the batch it belongs to.
    pub async fn generate(&self, url: &str, payload: &GeneratePayload) -> RequestOutcome {
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .json(payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(resp) => resp,
            Err(e) => {
                return RequestOutcome::failed(start.elapsed().as_secs_f64(), &e.to_string());
            },
        };

        let status = response.status();
        if status != StatusCode::OK {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            return RequestOutcome::failed(
                start.elapsed().as_secs_f64(),
                &format!("HTTP {}: {}", status.as_u16(), reason),
            );
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return RequestOutcome::failed(start.elapsed().as_secs_f64(), &e.to_string());
            },
        };
        let latency = start.elapsed().as_secs_f64();

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => RequestOutcome::ok(latency, estimate_tokens(&value)),
            Err(_) => RequestOutcome::failed(
                latency,
                &format!("Invalid JSON response with content-type: {content_type}"),
            ),
        }
    }

    /// Probe `<base_url>/health`; only HTTP 200 counts as healthy
    ///
    /// Any other status or a transport fault means "not ready".
    pub async fn check_health(&self, base_url: &str) -> bool {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_payload_wire_format() {
        let payload = GeneratePayload::standard();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["text"], "Once upon a time");
        assert_eq!(json["sampling_params"]["max_new_tokens"], 10);
        let temp = json["sampling_params"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_warmup_payload_is_minimal() {
        let payload = GeneratePayload::warmup();
        assert_eq!(payload.text, "Hello");
        assert_eq!(payload.sampling_params.max_new_tokens, 5);
    }

    #[test]
    fn test_estimate_tokens_counts_whitespace_tokens() {
        let body: Value = serde_json::from_str(r#"{"text": "a b c"}"#).unwrap();
        assert_eq!(estimate_tokens(&body), 3);
    }

    #[test]
    fn test_estimate_tokens_missing_field() {
        let body: Value = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert_eq!(estimate_tokens(&body), 0);
    }

    #[test]
    fn test_estimate_tokens_non_string_field() {
        let body: Value = serde_json::from_str(r#"{"text": 42}"#).unwrap();
        assert_eq!(estimate_tokens(&body), 0);
    }

    #[test]
    fn test_estimate_tokens_empty_text() {
        let body: Value = serde_json::from_str(r#"{"text": ""}"#).unwrap();
        assert_eq!(estimate_tokens(&body), 0);
    }

    #[test]
    fn test_truncate_error_caps_at_100_chars() {
        let long = "x".repeat(250);
        let outcome = RequestOutcome::failed(0.5, &long);
        assert_eq!(outcome.error.unwrap().len(), 100);
    }

    #[test]
    fn test_truncate_error_short_message_unchanged() {
        let outcome = RequestOutcome::failed(0.1, "connection reset");
        assert_eq!(outcome.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_truncate_error_respects_char_boundaries() {
        let multibyte = "é".repeat(150);
        let outcome = RequestOutcome::failed(0.1, &multibyte);
        assert_eq!(outcome.error.unwrap().chars().count(), 100);
    }

    #[test]
    fn test_outcome_serialization_skips_absent_error() {
        let json = serde_json::to_string(&RequestOutcome::ok(0.01, 3)).unwrap();
        assert!(!json.contains("error"));

        let json = serde_json::to_string(&RequestOutcome::failed(0.01, "boom")).unwrap();
        assert!(json.contains("boom"));
    }
}
