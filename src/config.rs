//! Report configuration.
//!
//! All thresholds are supplied by the caller and applied as given; nothing
//! here is validated. A run clones the config up front so it cannot change
//! while a pass is in progress.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::gaps::GapThresholds;

/// Thresholds for the refuel/drain detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_refuel_liters: f64,
    pub min_drain_liters: f64,
    /// Highest plausible engine consumption, litres per hour.
    pub max_consumption_liters_per_hour: f64,
    /// Suppress drains recorded while the vehicle was moving.
    pub use_ignition_heuristic: bool,
    pub gaps: GapThresholds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            min_refuel_liters: 10.0,
            min_drain_liters: 10.0,
            max_consumption_liters_per_hour: 30.0,
            use_ignition_heuristic: false,
            gaps: GapThresholds::default(),
        }
    }
}

/// Inclusive acceptable range for an environmental channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorBounds {
    pub min: f64,
    pub max: f64,
}

impl SensorBounds {
    pub fn new(min: f64, max: f64) -> Self {
        SensorBounds { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub detection: DetectionConfig,
    /// Drop fuel samples at or below 0.1 L (sensor dropouts).
    pub filter_near_zero_fuel: bool,
    pub temperature_bounds: SensorBounds,
    pub humidity_bounds: SensorBounds,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            detection: DetectionConfig::default(),
            filter_near_zero_fuel: false,
            temperature_bounds: SensorBounds::new(0.0, 30.0),
            humidity_bounds: SensorBounds::new(0.0, 80.0),
        }
    }
}

impl ReportConfig {
    /// Load a JSON config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ReportError> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| ReportError::Config(format!("{}: {}", path.display(), e)))
    }
}
