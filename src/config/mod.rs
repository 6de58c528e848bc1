//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast on malformed values. Tracker settings
//! can also come from a TOML file via [`ContextConfig`].

pub mod context;

pub use context::ContextConfig;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Upper bound between cursor re-checks while a synchronize is blocked.
    pub wake_interval_ms: u64,
    /// Thread name prefix for stream lanes.
    pub lane_prefix: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let wake_interval_ms = match std::env::var("STREAMSYNC_WAKE_INTERVAL_MS") {
            Ok(raw) => parse_interval("STREAMSYNC_WAKE_INTERVAL_MS", &raw)?,
            Err(_) => context::DEFAULT_WAKE_INTERVAL_MS,
        };

        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            wake_interval_ms,
            lane_prefix: std::env::var("STREAMSYNC_LANE_PREFIX")
                .unwrap_or_else(|_| context::DEFAULT_LANE_PREFIX.to_string()),
        })
    }

    /// Tracker settings derived from this configuration.
    pub fn context(&self) -> ContextConfig {
        ContextConfig {
            wake_interval_ms: self.wake_interval_ms,
            lane_prefix: self.lane_prefix.clone(),
        }
    }
}

fn parse_interval(name: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(Error::Config(format!("{name} must be greater than zero"))),
        Ok(ms) => Ok(ms),
        Err(e) => Err(Error::Config(format!("{name}={raw:?} is not a number: {e}"))),
    }
}
