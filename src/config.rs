//! Configuration management for the wheelie meter
//!
//! This module provides runtime configuration loading from JSON files,
//! so thresholds, the re-arm delay and the gauge curve can be tuned per
//! vehicle without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::GaugeCurve;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub gauge: GaugeConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Event detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Calibrated angle (degrees) at or above which an event is in progress
    pub wheelie_threshold: f64,
    /// Calibrated angle (degrees) classified as dangerous; display only
    pub danger_threshold: f64,
    /// Cooldown after an event ends during which samples are ignored (seconds)
    #[serde(default)]
    pub re_arm_delay_secs: f64,
    /// Expected sensor update interval in milliseconds (informational)
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
}

fn default_update_interval() -> u64 {
    100
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            wheelie_threshold: 20.0,
            danger_threshold: 45.0,
            re_arm_delay_secs: 0.0,
            update_interval_ms: default_update_interval(),
        }
    }
}

/// Gauge rendering configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GaugeConfig {
    #[serde(default)]
    pub curve: GaugeCurve,
}

/// Session rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub nickname_min_len: usize,
    pub nickname_max_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            nickname_min_len: 3,
            nickname_max_len: 20,
        }
    }
}

/// Result row formatting for persistence sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Name of the results table written by sinks
    pub table: String,
    /// Device label stored with each row (truncated to 100 characters)
    pub device: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            table: "wheelie_results".to_string(),
            device: "unknown".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config.sanitized()
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/wheelie_config.json")
    }

    /// Clamp values that would break the detector
    ///
    /// A negative re-arm delay is treated as zero and a danger threshold below
    /// the wheelie threshold is raised to match it.
    pub fn sanitized(mut self) -> Self {
        let detection = &mut self.detection;
        if !detection.re_arm_delay_secs.is_finite() || detection.re_arm_delay_secs < 0.0 {
            log::warn!(
                "[Config] re_arm_delay_secs={} is invalid, using 0",
                detection.re_arm_delay_secs
            );
            detection.re_arm_delay_secs = 0.0;
        }
        if detection.danger_threshold < detection.wheelie_threshold {
            log::warn!(
                "[Config] danger_threshold {} below wheelie_threshold {}, raising it",
                detection.danger_threshold,
                detection.wheelie_threshold
            );
            detection.danger_threshold = detection.wheelie_threshold;
        }
        self
    }
}
