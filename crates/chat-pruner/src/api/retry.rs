//! Automatic retry with exponential backoff and jitter.
//!
//! Retries transient gateway failures (429, 500, 502, 503, 504, network
//! errors, timeouts) with configurable exponential backoff. Never retries
//! other HTTP statuses, API-level errors, or unparseable/empty responses.

use std::time::Duration;

use crate::error::GatewayError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on the attempt number.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

/// Whether a gateway error is worth retrying.
pub fn is_transient(error: &GatewayError) -> bool {
    match error {
        GatewayError::Network(_) | GatewayError::Timeout(_) => true,
        GatewayError::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
        GatewayError::Api(_) | GatewayError::MalformedResponse(_) | GatewayError::EmptyResult => {
            false
        }
    }
}
