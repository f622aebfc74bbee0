use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use validator::Validate;

use crate::config_validator::ConfigValidator;
use crate::error::ShortenerError;

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

/// Service configuration, read from flags or the environment (a `.env` file
/// is loaded first by the binary).
#[derive(Debug, Clone, Parser, Validate)]
#[command(name = "shortly", version, about = "URL shortening service")]
pub struct Config {
    /// Host to bind the HTTP listener to
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listening port
    #[arg(long, env = "APP_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Redis address, `host:port` or a `redis://` URL
    #[arg(long, env = "DB_ADDR", default_value = "127.0.0.1:6379")]
    #[validate(length(min = 1))]
    pub db_addr: String,

    /// Redis password
    #[arg(long, env = "DB_PASS")]
    pub db_pass: Option<String>,

    /// Public domain of this service, used for short URLs and self-reference checks
    #[arg(long, env = "DOMAIN", default_value = "localhost:3000")]
    #[validate(length(min = 1))]
    pub domain: String,

    /// Shorten requests allowed per client per quota window
    #[arg(long, env = "API_QUOTA", default_value_t = 10)]
    #[validate(range(min = 1))]
    pub api_quota: i64,

    /// Quota window length, e.g. `30m`
    #[arg(long, env = "QUOTA_WINDOW", default_value = "30m", value_parser = parse_duration)]
    pub quota_window: Duration,

    /// Expiry applied when a request asks for the default (hours)
    #[arg(long, env = "DEFAULT_EXPIRY_HOURS", default_value_t = 24)]
    #[validate(range(min = 1))]
    pub default_expiry_hours: u32,

    /// Length of generated short identifiers
    #[arg(long, env = "ID_LENGTH", default_value_t = 6)]
    #[validate(range(min = 6, max = 32))]
    pub id_length: usize,

    /// Collision retries before identifier allocation gives up
    #[arg(long, env = "MAX_ALLOCATION_ATTEMPTS", default_value_t = 100)]
    #[validate(range(min = 1))]
    pub max_allocation_attempts: u32,

    /// Redis database holding short to long URL mappings
    #[arg(long, env = "MAPPING_DB", default_value_t = 0)]
    pub mapping_db: i64,

    /// Redis database holding client quota counters
    #[arg(long, env = "QUOTA_DB", default_value_t = 1)]
    pub quota_db: i64,

    /// Redis database holding the redirect counter
    #[arg(long, env = "COUNTER_DB", default_value_t = 1)]
    pub counter_db: i64,

    /// Timeout for a single store command, in milliseconds
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 2000)]
    #[validate(range(min = 1))]
    pub store_timeout_ms: u64,

    /// Take the client address from X-Forwarded-For / X-Real-IP. Only enable
    /// behind a proxy that overwrites these headers.
    #[arg(long, env = "TRUST_PROXY_HEADERS", default_value_t = false, action = clap::ArgAction::Set)]
    pub trust_proxy_headers: bool,

    /// Keep all state in process memory instead of Redis
    #[arg(long, env = "IN_MEMORY_STORE", default_value_t = false)]
    pub in_memory: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Parse flags and environment, then validate. Exits on `--help` and on
    /// unparsable arguments, like any clap binary.
    pub fn load() -> Result<Self, ShortenerError> {
        let config = Config::parse();
        config.validate_settings()?;
        Ok(config)
    }

    /// Run field-level and cross-field validation.
    pub fn validate_settings(&self) -> Result<(), ShortenerError> {
        self.validate()
            .map_err(|e| ShortenerError::Configuration(e.to_string()))?;
        ConfigValidator::validate(self)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ShortenerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ShortenerError::Configuration(format!("Invalid bind address: {}", e)))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
