//! Tracker settings for a [`Context`](crate::context::Context).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_WAKE_INTERVAL_MS: u64 = 50;
pub const DEFAULT_LANE_PREFIX: &str = "stream-lane";

/// Settings shared by every lane a context opens.
///
/// ```toml
/// wake_interval_ms = 20
/// lane_prefix = "gpu0"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    pub wake_interval_ms: u64,
    pub lane_prefix: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            wake_interval_ms: DEFAULT_WAKE_INTERVAL_MS,
            lane_prefix: DEFAULT_LANE_PREFIX.to_string(),
        }
    }
}

impl ContextConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad context config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read context config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn wake_interval(&self) -> Duration {
        Duration::from_millis(self.wake_interval_ms.max(1))
    }

    fn validate(&self) -> Result<()> {
        if self.wake_interval_ms == 0 {
            return Err(Error::Config("wake_interval_ms must be greater than zero".into()));
        }
        if self.lane_prefix.is_empty() {
            return Err(Error::Config("lane_prefix must not be empty".into()));
        }
        Ok(())
    }
}
