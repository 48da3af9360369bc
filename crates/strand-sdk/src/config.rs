//! Runtime configuration.

use std::time::Duration;

use crate::error::{Result, SdkError};

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Logical service identifier, recorded on instances this runtime executes.
    pub service_name: String,
    /// Durable store address: `memory:`, `sqlite:<path>` or `postgres://...`.
    pub store_url: String,
    /// How long `launch` waits for the store connection before failing fatally.
    pub connect_timeout: Duration,
    /// Maximum instances resumed concurrently during recovery.
    pub recovery_concurrency: usize,
}

impl RuntimeConfig {
    /// Create a configuration with the required options and defaults for
    /// the rest.
    pub fn new(service_name: impl Into<String>, store_url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            store_url: store_url.into(),
            connect_timeout: Duration::from_millis(10_000),
            recovery_concurrency: 4,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `STRAND_SERVICE_NAME`: logical service identifier
    /// - `STRAND_STORE_URL`: durable store connection string
    ///
    /// Optional (with defaults):
    /// - `STRAND_CONNECT_TIMEOUT_MS`: store connection timeout (default: 10000)
    /// - `STRAND_RECOVERY_CONCURRENCY`: parallel recovery limit (default: 4)
    pub fn from_env() -> Result<Self> {
        let service_name = std::env::var("STRAND_SERVICE_NAME")
            .map_err(|_| SdkError::Config("STRAND_SERVICE_NAME is required".to_string()))?;

        let store_url = std::env::var("STRAND_STORE_URL")
            .map_err(|_| SdkError::Config("STRAND_STORE_URL is required".to_string()))?;

        let connect_timeout_ms: u64 = std::env::var("STRAND_CONNECT_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .map_err(|_| {
                SdkError::Config(
                    "STRAND_CONNECT_TIMEOUT_MS must be a non-negative integer".to_string(),
                )
            })?;

        let recovery_concurrency: usize = std::env::var("STRAND_RECOVERY_CONCURRENCY")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .map_err(|_| {
                SdkError::Config("STRAND_RECOVERY_CONCURRENCY must be a positive integer".to_string())
            })?;

        let config = Self {
            service_name,
            store_url,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            recovery_concurrency,
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the store connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the recovery concurrency limit.
    pub fn with_recovery_concurrency(mut self, limit: usize) -> Self {
        self.recovery_concurrency = limit;
        self
    }

    /// Check the required options are present and sane.
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(SdkError::Config("service name must not be empty".to_string()));
        }
        if self.store_url.trim().is_empty() {
            return Err(SdkError::Config("store URL must not be empty".to_string()));
        }
        if self.recovery_concurrency == 0 {
            return Err(SdkError::Config(
                "recovery concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponential backoff policy for retrying store calls during recovery.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries, just one attempt).
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before a given attempt (1-indexed): `base * 2^(attempt-1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}
