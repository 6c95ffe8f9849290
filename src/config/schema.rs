//! Configuration schema for Gantry
//!
//! Configuration is stored at `~/.config/gantry/config.toml`

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Remote job service settings
    pub remote: RemoteConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Remote job service settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the job service API
    pub base_url: Option<String>,

    /// Bearer token for the job service (also settable via GANTRY_TOKEN)
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum total artifact bytes per tenant, in MB (0 disables caching)
    pub max_total_mb: u64,

    /// Evict artifacts not read for this many days
    pub artifact_max_age_days: u32,

    /// TTL for metadata of jobs that are still running, in seconds
    pub running_ttl_secs: u64,

    /// TTL for metadata of finished jobs, in hours
    pub finished_ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_total_mb: 1024,
            artifact_max_age_days: 14,
            running_ttl_secs: 30,
            finished_ttl_hours: 6,
        }
    }
}

impl CacheConfig {
    /// Whether caching is enabled at all
    pub fn is_enabled(&self) -> bool {
        self.max_total_mb > 0
    }

    /// Artifact byte cap
    pub fn max_total_bytes(&self) -> u64 {
        self.max_total_mb * 1024 * 1024
    }

    /// TTL applied to metadata of a job in a non-terminal state
    pub fn running_ttl(&self) -> Duration {
        Duration::from_secs(self.running_ttl_secs)
    }

    /// TTL applied to metadata of a finished job
    pub fn finished_ttl(&self) -> Duration {
        Duration::from_secs(self.finished_ttl_hours * 3600)
    }

    /// Idle age past which artifacts are swept
    pub fn artifact_max_age(&self) -> Duration {
        Duration::from_secs(u64::from(self.artifact_max_age_days) * 24 * 3600)
    }
}
