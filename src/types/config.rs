//! Configuration structures.
//!
//! Every field has a default matching the timings Aqara devices are tuned
//! for; a JSON config file only needs to name what it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::Result;

/// Global translator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Pulse, press and occupancy timings.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Timer durations used by the decode routines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// How long a pulsed flag stays `true` after the last trigger.
    #[serde(with = "humantime_serde")]
    pub pulse_hold: Duration,

    /// Press duration above which a release counts as a long press.
    #[serde(with = "humantime_serde")]
    pub long_press_threshold: Duration,

    /// Time without a motion report before occupancy drops to `false`.
    #[serde(with = "humantime_serde")]
    pub occupancy_timeout: Duration,

    /// Period of the `no_motion` counter.
    #[serde(with = "humantime_serde")]
    pub no_motion_interval: Duration,

    /// Last value the `no_motion` counter emits before it freezes.
    pub no_motion_limit: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pulse_hold: Duration::from_millis(300),
            long_press_threshold: Duration::from_millis(240),
            occupancy_timeout: Duration::from_secs(60),
            no_motion_interval: Duration::from_secs(1),
            no_motion_limit: 1800,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
