//! Streaming configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Default replacement-queue budget
pub const DEFAULT_MAX_RESIDENT_CHUNKS: usize = 512;

/// Default dwell time before a freshly loaded chunk may replace its parent
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 100;

/// Deepest `max_depth` whose tile coordinates still fit in `u32`
pub const MAX_DEPTH_LIMIT: u32 = 31;

/// Tuning parameters for [`ChunkedStreamer`](crate::streaming::ChunkedStreamer)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Maximum allowed screen-space error in pixels
    pub tau: f32,
    /// Deepest quadtree level that may be requested (root = 0)
    pub max_depth: u32,
    /// Number of loaded chunks kept before LRU eviction kicks in
    pub max_resident_chunks: usize,
    /// Minimum time a chunk must be loaded before it replaces its parent
    pub grace_period_ms: u64,
    /// Failed loads tolerated before a chunk is left as skeleton for good
    pub max_load_attempts: u32,
    /// Run `ChunkLoader::load` on the rayon pool while draining the load queue
    pub parallel_loads: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            tau: 2.0,
            max_depth: 8,
            max_resident_chunks: DEFAULT_MAX_RESIDENT_CHUNKS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            max_load_attempts: 3,
            parallel_loads: false,
        }
    }
}

impl StreamingConfig {
    /// Grace period as a [`Duration`]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Reject values the streamer cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.tau.is_finite() && self.tau > 0.0) {
            return Err(Error::InvalidConfig(format!("tau must be positive, got {}", self.tau)));
        }
        if self.max_resident_chunks == 0 {
            return Err(Error::InvalidConfig("max_resident_chunks must be at least 1".into()));
        }
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "max_depth must be at most {}, got {}",
                MAX_DEPTH_LIMIT, self.max_depth
            )));
        }
        if self.max_load_attempts == 0 {
            return Err(Error::InvalidConfig("max_load_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Load and validate a config from a JSON file
    pub fn load_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as pretty-printed JSON, creating parent directories
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }
}
