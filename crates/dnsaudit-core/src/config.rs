//! Configuration types for the DNS audit job
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Main audit configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Where zones, inventory and evaluations come from
    #[serde(default)]
    pub backend: BackendConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AuditConfig {
    /// Create a new configuration with defaults
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.backend.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-memory backend (empty unless seeded programmatically)
    #[default]
    Memory,

    /// JSON snapshot of zones, regions and prior evaluations
    Snapshot {
        /// Path to the snapshot file
        path: String,
        /// Where submitted batches are written (defaults next to the snapshot)
        #[serde(default)]
        output_path: Option<String>,
        /// Items served per listing page
        #[serde(default = "default_page_size")]
        page_size: usize,
    },

    /// Custom backend
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl BackendConfig {
    /// Validate the backend configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            BackendConfig::Memory => Ok(()),
            BackendConfig::Snapshot {
                path, page_size, ..
            } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Snapshot path cannot be empty"));
                }
                if *page_size == 0 {
                    return Err(crate::Error::config("Snapshot page size must be > 0"));
                }
                Ok(())
            }
            BackendConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom backend factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom backend config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the backend type name
    pub fn type_name(&self) -> &str {
        match self {
            BackendConfig::Memory => "memory",
            BackendConfig::Snapshot { .. } => "snapshot",
            BackendConfig::Custom { factory, .. } => factory,
        }
    }
}

/// What the inventory collector does when one region's address listing fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionFailurePolicy {
    /// Fail the whole collection (and the run)
    #[default]
    Abort,
    /// Log the region and continue with the others
    ///
    /// Addresses in a skipped region look unbacked, so records pointing at
    /// them are reported NON_COMPLIANT for this run.
    Skip,
}

impl FromStr for RegionFailurePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(RegionFailurePolicy::Abort),
            "skip" => Ok(RegionFailurePolicy::Skip),
            other => Err(crate::Error::config(format!(
                "Unknown region failure policy '{}' (expected abort or skip)",
                other
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of zones processed at the same time
    ///
    /// Every zone costs at least one record listing, one evaluation lookup
    /// and one submission; this bounds the request rate against those APIs.
    #[serde(default = "default_max_concurrent_zones")]
    pub max_concurrent_zones: usize,

    /// Behaviour when a single region's address listing fails
    #[serde(default)]
    pub region_failure_policy: RegionFailurePolicy,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_concurrent_zones == 0 {
            return Err(crate::Error::config("max_concurrent_zones must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_zones: default_max_concurrent_zones(),
            region_failure_policy: RegionFailurePolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_page_size() -> usize {
    100
}

fn default_max_concurrent_zones() -> usize {
    8
}

fn default_event_channel_capacity() -> usize {
    1000
}
