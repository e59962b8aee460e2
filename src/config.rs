//! Placement configuration and rendering mode.
//!
//! `PlacementConfig` is handed to the tile worker on every parse or
//! re-placement call; the worker never keeps it across calls.

use std::f32::consts::FRAC_PI_2;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {value}")]
    OutOfRange { field: &'static str, value: f32 },
}

/// Rendering mode the worker builds buckets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapMode {
    /// Interactive map; labels may cross tile edges.
    #[default]
    Continuous,
    /// One-shot still image; labels crossing tile edges are dropped.
    Still,
}

/// Label placement policy for one placement pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Map bearing in radians.
    pub angle: f32,
    /// Camera pitch in radians, in [0, π/2).
    pub pitch: f32,
    /// Overlap in pixels two boxes may share on each axis before the later
    /// one is hidden.
    pub overlap_tolerance: f32,
    /// Keep every collision box around for debug rendering.
    pub debug: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            angle: 0.0,
            pitch: 0.0,
            overlap_tolerance: 0.0,
            debug: false,
        }
    }
}

impl PlacementConfig {
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_overlap_tolerance(mut self, tolerance: f32) -> Self {
        self.overlap_tolerance = tolerance;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse a placement config from JSON. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PlacementConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a placement config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.angle.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "angle",
                value: self.angle,
            });
        }
        if !(0.0..FRAC_PI_2).contains(&self.pitch) {
            return Err(ConfigError::OutOfRange {
                field: "pitch",
                value: self.pitch,
            });
        }
        if !(self.overlap_tolerance >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "overlap_tolerance",
                value: self.overlap_tolerance,
            });
        }
        Ok(())
    }
}
