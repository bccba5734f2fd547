//! Configuration types for the weft node.
//!
//! All config structs validate their values at construction time via
//! fallible builders. Post-deserialization validation is available via
//! the `validate()` method on each struct.

// The schemars `JsonSchema` derive macro internally uses `.unwrap()` in its
// expansions. Config types are declarative structs with minimal procedural
// code, so allow it module-wide.
#![allow(clippy::disallowed_methods)]

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Maximum meaningful PoW target score (trailing zero bits of a digest word).
const MAX_TARGET_SCORE: u32 = 32;

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Leak-detection thresholds for the object cache.
///
/// Purely diagnostic: exceeding a threshold produces a warning log entry,
/// never an operation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LeakDetectionConfig {
    /// Number of simultaneous handles on one object above which a leak is
    /// suspected.
    #[serde(default = "default_max_consumers")]
    pub max_consumers_per_object: usize,
    /// How long a single handle may be held before a leak is suspected.
    #[serde(default = "default_max_hold_time")]
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub max_consumer_hold_time: Duration,
}

#[bon::bon]
impl LeakDetectionConfig {
    /// Creates a new leak-detection configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `max_consumers_per_object` is 0.
    #[builder]
    pub fn new(
        #[builder(default = default_max_consumers())] max_consumers_per_object: usize,
        #[builder(default = default_max_hold_time())] max_consumer_hold_time: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { max_consumers_per_object, max_consumer_hold_time };
        config.validate()?;
        Ok(config)
    }
}

impl LeakDetectionConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_consumers_per_object == 0 {
            return Err(ConfigError::Validation {
                message: "max_consumers_per_object must be >= 1, got 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LeakDetectionConfig {
    fn default() -> Self {
        Self {
            max_consumers_per_object: default_max_consumers(),
            max_consumer_hold_time: default_max_hold_time(),
        }
    }
}

/// Object-cache configuration.
///
/// `cache_time` is the idle linger: an unpinned entry stays cached until it
/// has been idle that long. Zero disables the linger entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheConfig {
    /// How long an unpinned entry lingers in the cache before it becomes an
    /// eviction candidate.
    #[serde(default = "default_cache_time")]
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub cache_time: Duration,
    /// Optional leak-detection thresholds. `None` disables leak diagnostics.
    #[serde(default)]
    pub leak_detection: Option<LeakDetectionConfig>,
}

#[bon::bon]
impl CacheConfig {
    /// Creates a new cache configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the leak-detection section is
    /// present and invalid.
    #[builder]
    pub fn new(
        #[builder(default = default_cache_time())] cache_time: Duration,
        leak_detection: Option<LeakDetectionConfig>,
    ) -> Result<Self, ConfigError> {
        let config = Self { cache_time, leak_detection };
        config.validate()?;
        Ok(config)
    }
}

impl CacheConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(leak) = &self.leak_detection {
            leak.validate()?;
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { cache_time: default_cache_time(), leak_detection: None }
    }
}

/// Proof-of-work handler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PowConfig {
    /// Required score: trailing zero bits of the work digest (1-32).
    #[serde(default = "default_target_score")]
    pub target_score: u32,
    /// Minimum time between remote connection attempts after a failure.
    #[serde(default = "default_remote_cooldown")]
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub remote_cooldown: Duration,
}

#[bon::bon]
impl PowConfig {
    /// Creates a new PoW configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `target_score` is outside 1-32.
    #[builder]
    pub fn new(
        #[builder(default = default_target_score())] target_score: u32,
        #[builder(default = default_remote_cooldown())] remote_cooldown: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { target_score, remote_cooldown };
        config.validate()?;
        Ok(config)
    }
}

impl PowConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_score == 0 || self.target_score > MAX_TARGET_SCORE {
            return Err(ConfigError::Validation {
                message: format!(
                    "target_score must be 1-{}, got {}",
                    MAX_TARGET_SCORE, self.target_score
                ),
            });
        }
        Ok(())
    }
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            target_score: default_target_score(),
            remote_cooldown: default_remote_cooldown(),
        }
    }
}

/// Snapshot subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotConfig {
    /// Opaque network identity written into every snapshot header.
    #[serde(default)]
    pub network_id: u64,
    /// Number of snapshot files to retain on disk.
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,
}

#[bon::bon]
impl SnapshotConfig {
    /// Creates a new snapshot configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `max_snapshots` is 0.
    #[builder]
    pub fn new(
        #[builder(default)] network_id: u64,
        #[builder(default = default_max_snapshots())] max_snapshots: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self { network_id, max_snapshots };
        config.validate()?;
        Ok(config)
    }
}

impl SnapshotConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_snapshots == 0 {
            return Err(ConfigError::Validation {
                message: "max_snapshots must be >= 1, got 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { network_id: 0, max_snapshots: default_max_snapshots() }
    }
}

fn default_max_consumers() -> usize {
    20
}

fn default_max_hold_time() -> Duration {
    Duration::from_secs(100)
}

fn default_cache_time() -> Duration {
    Duration::from_secs(30)
}

fn default_target_score() -> u32 {
    8
}

fn default_remote_cooldown() -> Duration {
    Duration::from_secs(30)
}

fn default_max_snapshots() -> usize {
    3
}
