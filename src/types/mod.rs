pub mod loose;

pub use loose::*;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One fuel row as delivered by the report service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFuelRecord {
    pub wdate: Option<String>,
    pub liters: Option<LooseNumber>,
    pub latitude: Option<LooseNumber>,
    pub longitude: Option<LooseNumber>,
    pub temperature_c: Option<LooseNumber>,
    pub humidity_percent: Option<LooseNumber>,
}

/// One environmental sensor row as delivered by the report service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSensorRecord {
    pub wdate: Option<String>,
    pub temperature_c: Option<LooseNumber>,
    pub humidity_percent: Option<LooseNumber>,
}

/// A normalized fuel/GPS sample.
///
/// The motion fields are relative to the previous observation in sorted
/// order and are zero for the first one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub liters: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Inline readings; used for sensor rollups when no sensor stream is given.
    pub temperature_c: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub distance_km: f64,
    pub time_delta_hours: f64,
    pub speed_kmh: f64,
}

impl Observation {
    /// Observation with zeroed motion fields.
    pub fn new(timestamp: NaiveDateTime, liters: f64, latitude: f64, longitude: f64) -> Self {
        Observation {
            timestamp,
            liters,
            latitude,
            longitude,
            temperature_c: None,
            humidity_percent: None,
            distance_km: 0.0,
            time_delta_hours: 0.0,
            speed_kmh: 0.0,
        }
    }

    /// Local calendar day of the sample.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// A normalized environmental sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp: NaiveDateTime,
    pub temperature_c: Option<f64>,
    pub humidity_percent: Option<f64>,
    /// Hours since the previous sensor sample (0 for the first).
    pub time_delta_hours: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Refuel,
    Drain,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Refuel => "Refuel",
            EventKind::Drain => "Drain",
        }
    }
}

/// A classified refuel or drain.
///
/// `start` is the sample immediately before the level began to change and
/// `end` is the last sample of the change. `volume_liters` is always a
/// positive magnitude.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub start_index: usize,
    pub end_index: usize,
    pub start: Observation,
    pub end: Observation,
    pub volume_liters: f64,
    pub timestamp: NaiveDateTime,
}

impl Event {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Where the event finished, as `(lat, lon)`.
    pub fn location(&self) -> (f64, f64) {
        (self.end.latitude, self.end.longitude)
    }
}

/// Milliseconds-precision elapsed hours from `from` to `to`.
pub fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}
