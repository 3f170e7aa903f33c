//! Service configuration from environment variables.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// A variable could not be parsed or failed validation.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// Typed service configuration.
///
/// Binaries call [`Settings::from_env`] once at startup (after `dotenvy`
/// has loaded `.env` in development) and pass the pieces down; nothing else
/// reads the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Interface the API binds to.
    pub api_host: String,
    /// Port the API binds to.
    pub api_port: u16,
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Connection-pool bound.
    pub db_max_connections: u32,
    /// Base URL of the payment provider.
    pub payment_api_base_url: String,
    /// Base URL of the supplier booking provider.
    pub provider_api_base_url: String,
    /// Per-call provider timeout.
    pub provider_timeout: Duration,
    /// Outbox rows claimed per worker iteration.
    pub outbox_batch_size: usize,
    /// Worker sleep between polls.
    pub outbox_poll_interval: Duration,
    /// Additional retry attempts per provider call.
    pub retry_max_retries: usize,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
    /// Backoff multiplier (>= 1).
    pub retry_backoff_factor: f64,
    /// Cap on the per-attempt delay.
    pub retry_max_delay: Duration,
    /// Consecutive failures that open a provider circuit.
    pub breaker_failure_threshold: usize,
    /// How long an open circuit waits before probing.
    pub breaker_recovery: Duration,
    /// Attempt cap for reservation-code generation.
    pub code_max_retries: usize,
    /// Rate-limit hint for the (external) reservations limiter.
    pub reservations_per_minute: u32,
}

impl Settings {
    /// Load and validate every setting from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on a missing `DATABASE_URL` or any
    /// unparsable/out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings through an injected lookup (test-friendly).
    ///
    /// # Errors
    ///
    /// Same as [`Settings::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Lookup(&lookup);

        let settings = Self {
            api_host: vars.string_or("API_HOST", "0.0.0.0"),
            api_port: vars.parse("API_PORT", 8000)?,
            database_url: (vars.0)("DATABASE_URL")
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            db_max_connections: vars.parse("DB_MAX_CONNECTIONS", 10)?,
            payment_api_base_url: vars.string_or("STRIPE_API_BASE_URL", "https://api.stripe.com"),
            provider_api_base_url: vars
                .string_or("PROVIDER_API_BASE_URL", "https://provider.example.com"),
            provider_timeout: Duration::from_secs_f64(
                vars.parse_positive_f64("EXTERNAL_API_TIMEOUT_SECONDS", 10.0)?,
            ),
            outbox_batch_size: vars.parse_positive("OUTBOX_BATCH_SIZE", 20)?,
            outbox_poll_interval: Duration::from_secs_f64(
                vars.parse_positive_f64("OUTBOX_POLL_INTERVAL_SECONDS", 5.0)?,
            ),
            retry_max_retries: vars.parse("RETRY_MAX_RETRIES", 3)?,
            retry_base_delay: Duration::from_millis(
                vars.parse_positive("RETRY_BASE_DELAY_MS", 500)? as u64,
            ),
            retry_backoff_factor: vars.parse_positive_f64("RETRY_BACKOFF_FACTOR", 2.0)?,
            retry_max_delay: Duration::from_millis(
                vars.parse_positive("RETRY_MAX_DELAY_MS", 60_000)? as u64,
            ),
            breaker_failure_threshold: vars.parse_positive("CIRCUIT_BREAKER_FAILURE_THRESHOLD", 5)?,
            breaker_recovery: Duration::from_secs_f64(
                vars.parse_positive_f64("CIRCUIT_BREAKER_RECOVERY_SECONDS", 30.0)?,
            ),
            code_max_retries: vars.parse_positive("CODE_MAX_RETRIES", 1_000)?,
            reservations_per_minute: vars.parse("RATE_LIMIT_RESERVATIONS_PER_MINUTE", 30)?,
        };

        if settings.retry_backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                name: "RETRY_BACKOFF_FACTOR",
                reason: "must be >= 1".to_string(),
            });
        }
        Ok(settings)
    }

    /// Socket address the API binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

struct Lookup<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Lookup<'_, F> {
    fn string_or(&self, name: &str, default: &str) -> String {
        (self.0)(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match (self.0)(name) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn parse_positive(&self, name: &'static str, default: usize) -> Result<usize, ConfigError> {
        let value: usize = self.parse(name, default)?;
        if value == 0 {
            return Err(ConfigError::Invalid {
                name,
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    }

    fn parse_positive_f64(&self, name: &'static str, default: f64) -> Result<f64, ConfigError> {
        let value: f64 = self.parse(name, default)?;
        if value <= 0.0 {
            return Err(ConfigError::Invalid {
                name,
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    }
}
