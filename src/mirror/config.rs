//! Mirror Configuration
//!
//! Every threshold of the delay controller and eviction policy is a tunable
//! default here. Durations serialize as milliseconds.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | MIRROR_DELAY_SECONDS | 5 | Playback delay (0 = real-time passthrough) |
//! | MIRROR_CHUNK_INTERVAL_MS | 100 | Segment source cadence |
//! | MIRROR_DRIFT_TICK_MS | 500 | Drift-correction period |
//! | MIRROR_EVICTION_INTERVAL_MS | 5000 | Eviction period |

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Target offset between buffer end and playback cursor, whole seconds
    pub delay_seconds: u32,
    /// Segment source cadence
    #[serde(with = "duration_millis")]
    pub chunk_interval: Duration,
    /// Drift-correction period while playing
    #[serde(with = "duration_millis")]
    pub drift_tick_interval: Duration,
    /// Eviction period while playing
    #[serde(with = "duration_millis")]
    pub eviction_interval: Duration,
    /// Buffering-progress poll period (one display frame)
    #[serde(with = "duration_millis")]
    pub buffering_poll_interval: Duration,
    pub drift: DriftConfig,
    pub eviction: EvictionConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        MirrorConfig {
            delay_seconds: 5,
            chunk_interval: Duration::from_millis(100),
            drift_tick_interval: Duration::from_millis(500),
            eviction_interval: Duration::from_secs(5),
            buffering_poll_interval: Duration::from_millis(16),
            drift: DriftConfig::default(),
            eviction: EvictionConfig::default(),
        }
    }
}

impl MirrorConfig {
    /// Short delay and eviction window for tests
    pub fn test() -> Self {
        MirrorConfig {
            delay_seconds: 2,
            eviction: EvictionConfig {
                start_after_secs: 8.0,
                retain_secs: 4.0,
            },
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }

    /// Zero delay routes the source straight to the playback surface
    pub fn is_passthrough(&self) -> bool {
        self.delay_seconds == 0
    }

    pub fn delay_secs_f64(&self) -> f64 {
        f64::from(self.delay_seconds)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: MirrorConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Defaults overridden by `MIRROR_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `MIRROR_*` overrides; unparsable values are ignored
    pub fn apply_env(&mut self) {
        if let Some(delay) = env_parse::<u32>("MIRROR_DELAY_SECONDS") {
            self.delay_seconds = delay;
        }
        if let Some(ms) = env_parse::<u64>("MIRROR_CHUNK_INTERVAL_MS") {
            self.chunk_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("MIRROR_DRIFT_TICK_MS") {
            self.drift_tick_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("MIRROR_EVICTION_INTERVAL_MS") {
            self.eviction_interval = Duration::from_millis(ms);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("chunk_interval", self.chunk_interval),
            ("drift_tick_interval", self.drift_tick_interval),
            ("eviction_interval", self.eviction_interval),
            ("buffering_poll_interval", self.buffering_poll_interval),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        if self.eviction.retain_secs > self.eviction.start_after_secs {
            return Err(ConfigError::Invalid(format!(
                "eviction.retain_secs ({}) exceeds eviction.start_after_secs ({})",
                self.eviction.retain_secs, self.eviction.start_after_secs
            )));
        }
        let positive = [
            ("drift.max_drift_secs", self.drift.max_drift_secs),
            ("drift.stall_advance_secs", self.drift.stall_advance_secs),
            ("drift.stall_skip_secs", self.drift.stall_skip_secs),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        // A skip must stay inside the media required ahead of the cursor
        if self.drift.stall_skip_secs >= self.drift.stall_min_ahead_secs {
            return Err(ConfigError::Invalid(format!(
                "drift.stall_skip_secs ({}) must be below drift.stall_min_ahead_secs ({})",
                self.drift.stall_skip_secs, self.drift.stall_min_ahead_secs
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Drift correction and stall detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Drift beyond this jumps the cursor straight to the target
    pub max_drift_secs: f64,
    /// Advancement below this counts as a stalled tick
    pub stall_advance_secs: f64,
    /// Skip once the stall counter exceeds this
    pub stall_ticks: u32,
    /// Forward skip applied to a stalled cursor
    pub stall_skip_secs: f64,
    /// Buffered media required ahead of the cursor before skipping
    pub stall_min_ahead_secs: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        DriftConfig {
            max_drift_secs: 0.5,
            stall_advance_secs: 0.1,
            stall_ticks: 2,
            stall_skip_secs: 0.5,
            stall_min_ahead_secs: 1.0,
        }
    }
}

/// Trailing-window eviction thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Normal eviction starts once the cursor passes this position
    pub start_after_secs: f64,
    /// Media kept behind the cursor
    pub retain_secs: f64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        EvictionConfig {
            start_after_secs: 40.0,
            retain_secs: 30.0,
        }
    }
}

/// Serde helper for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
