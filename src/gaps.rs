use serde::{Deserialize, Serialize};

use crate::types::Observation;

/// Limits beyond which two consecutive samples are no longer continuous.
///
/// Used by the event detector (no event may span a gap) and by track
/// segmentation (gaps are drawn as separate edges).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapThresholds {
    /// Largest allowed time between samples, minutes.
    pub max_time_gap_minutes: f64,
    /// Largest allowed jump between samples, kilometres.
    pub max_distance_km: f64,
}

impl Default for GapThresholds {
    fn default() -> Self {
        GapThresholds {
            max_time_gap_minutes: 30.0,
            max_distance_km: 5.0,
        }
    }
}

impl GapThresholds {
    pub fn max_time_gap_ms(&self) -> f64 {
        self.max_time_gap_minutes * 60_000.0
    }

    /// True when the step from `prev` to `cur` breaks telemetry continuity.
    ///
    /// `cur.distance_km` must already be relative to `prev`.
    pub fn is_discontinuity(&self, prev: &Observation, cur: &Observation) -> bool {
        let elapsed_ms = (cur.timestamp - prev.timestamp).num_milliseconds() as f64;
        elapsed_ms > self.max_time_gap_ms() || cur.distance_km > self.max_distance_km
    }
}
