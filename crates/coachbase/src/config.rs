use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

use coachbase_core::retry::RetryPolicy;

/// Rejected configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("RETRY_MAX_ATTEMPTS must be at least 1")]
    ZeroAttempts,
    #[error("CACHE_MAX_ENTRIES must be at least 1")]
    ZeroCacheSize,
    #[error("RETRY_BASE_DELAY_MS ({base}) exceeds RETRY_MAX_DELAY_MS ({max})")]
    BaseDelayAboveMax { base: u64, max: u64 },
}

/// Persistence layer configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Total attempts per storage operation, first try included (default: 3)
    pub retry_max_attempts: u32,
    /// Backoff after the first failed attempt in milliseconds (default: 100)
    pub retry_base_delay_ms: u64,
    /// Backoff cap in milliseconds (default: 2,000)
    pub retry_max_delay_ms: u64,
    /// Events kept in the bus history (default: 1,000)
    pub event_history_max_size: usize,
    /// Cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: u64,
    /// Maximum number of cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Per-attempt transaction bound in milliseconds (default: unbounded)
    pub transaction_timeout_ms: Option<u64>,
    /// Per-handler bound in milliseconds (default: unbounded)
    pub event_handler_timeout_ms: Option<u64>,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    pub redis_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RETRY_MAX_ATTEMPTS` - Total attempts per operation (default: 3)
    /// - `RETRY_BASE_DELAY_MS` - First backoff delay (default: 100)
    /// - `RETRY_MAX_DELAY_MS` - Backoff cap (default: 2,000)
    /// - `EVENT_HISTORY_MAX_SIZE` - Bus history size (default: 1,000)
    /// - `CACHE_TTL_SECONDS` - Cache TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `TRANSACTION_TIMEOUT_MS` - Transaction attempt bound (default: unset)
    /// - `EVENT_HANDLER_TIMEOUT_MS` - Event handler bound (default: unset)
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    ///
    /// Values that fail to parse fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::defaults();

        Self {
            retry_max_attempts: parse(lookup("RETRY_MAX_ATTEMPTS"))
                .unwrap_or(defaults.retry_max_attempts),
            retry_base_delay_ms: parse(lookup("RETRY_BASE_DELAY_MS"))
                .unwrap_or(defaults.retry_base_delay_ms),
            retry_max_delay_ms: parse(lookup("RETRY_MAX_DELAY_MS"))
                .unwrap_or(defaults.retry_max_delay_ms),
            event_history_max_size: parse(lookup("EVENT_HISTORY_MAX_SIZE"))
                .unwrap_or(defaults.event_history_max_size),
            cache_ttl_seconds: parse(lookup("CACHE_TTL_SECONDS"))
                .unwrap_or(defaults.cache_ttl_seconds),
            cache_max_entries: parse(lookup("CACHE_MAX_ENTRIES"))
                .unwrap_or(defaults.cache_max_entries),
            transaction_timeout_ms: parse(lookup("TRANSACTION_TIMEOUT_MS")),
            event_handler_timeout_ms: parse(lookup("EVENT_HANDLER_TIMEOUT_MS")),
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
        }
    }

    fn defaults() -> Self {
        Self {
            retry_max_attempts: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 2_000,
            event_history_max_size: 1_000,
            cache_ttl_seconds: 300,
            cache_max_entries: 10_000,
            transaction_timeout_ms: None,
            event_handler_timeout_ms: None,
            redis_url: "redis://localhost:6379".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.cache_max_entries == 0 {
            return Err(ConfigError::ZeroCacheSize);
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigError::BaseDelayAboveMax {
                base: self.retry_base_delay_ms,
                max: self.retry_max_delay_ms,
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn transaction_timeout(&self) -> Option<Duration> {
        self.transaction_timeout_ms.map(Duration::from_millis)
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.event_handler_timeout_ms.map(Duration::from_millis)
    }
}

fn parse<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}
