use aerobook_core::{BookingSettings, RetryPolicy};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BookingConfig {
    /// How long `reserve` waits for the flight lock.
    pub lock_timeout_seconds: u64,
    /// Lease on a Redis lock; a crashed holder blocks the flight at most this long.
    pub lock_ttl_seconds: u64,
    pub lock_retry_interval_ms: u64,
    /// Extra attempts the API makes on `lock_unavailable` / `seat_conflict`.
    pub retry_attempts: usize,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            lock_timeout_seconds: 30,
            lock_ttl_seconds: 60,
            lock_retry_interval_ms: 50,
            retry_attempts: 2,
        }
    }
}

impl BookingConfig {
    pub fn settings(&self) -> BookingSettings {
        BookingSettings {
            lock_timeout: Duration::from_secs(self.lock_timeout_seconds),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_attempts,
            ..RetryPolicy::default()
        }
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        // A zero TTL makes every Redis lease expire immediately.
        if self.lock_ttl_seconds == 0 {
            return Err(config::ConfigError::Message(
                "booking.lock_ttl_seconds must be greater than zero".into(),
            ));
        }
        if self.lock_retry_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "booking.lock_retry_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    #[default]
    Redis,
    Local,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LockConfig {
    #[serde(default)]
    pub backend: LockBackend,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `AEROBOOK__BOOKING__LOCK_TIMEOUT_SECONDS=10`
            .add_source(config::Environment::with_prefix("AEROBOOK").separator("__"))
            .build()?;

        let cfg: Self = s.try_deserialize()?;
        cfg.booking.validate()?;
        Ok(cfg)
    }

    /// Builds a config from TOML text alone.
    pub fn from_toml(contents: &str) -> Result<Self, config::ConfigError> {
        let cfg: Self = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.booking.validate()?;
        Ok(cfg)
    }
}
