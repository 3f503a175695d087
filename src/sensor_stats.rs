//! Temperature and humidity rollups.
//!
//! Time out of bounds is a sample-weighted sum: every out-of-range sample
//! contributes its own `time_delta_hours`, not a continuous-time integral.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::SensorBounds;
use crate::types::SensorSample;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sample_count: usize,
    pub out_of_bounds_hours: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorTotals {
    pub temperature: Option<ChannelStats>,
    pub humidity: Option<ChannelStats>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorDayStats {
    pub date: NaiveDate,
    pub temperature: Option<ChannelStats>,
    pub humidity: Option<ChannelStats>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorStats {
    pub daily: Vec<SensorDayStats>,
    pub total: SensorTotals,
}

#[derive(Clone, Copy, Debug)]
struct ChannelAccumulator {
    bounds: SensorBounds,
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
    out_of_bounds_hours: f64,
}

impl ChannelAccumulator {
    fn new(bounds: SensorBounds) -> Self {
        ChannelAccumulator {
            bounds,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
            out_of_bounds_hours: 0.0,
        }
    }

    fn add(&mut self, value: Option<f64>, delta_hours: f64) {
        let Some(v) = value else {
            return;
        };
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.sum += v;
        self.count += 1;
        if !self.bounds.contains(v) {
            self.out_of_bounds_hours += delta_hours;
        }
    }

    fn finish(&self) -> Option<ChannelStats> {
        (self.count > 0).then(|| ChannelStats {
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
            sample_count: self.count,
            out_of_bounds_hours: self.out_of_bounds_hours,
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct PairAccumulator {
    temperature: ChannelAccumulator,
    humidity: ChannelAccumulator,
}

impl PairAccumulator {
    fn new(temperature_bounds: SensorBounds, humidity_bounds: SensorBounds) -> Self {
        PairAccumulator {
            temperature: ChannelAccumulator::new(temperature_bounds),
            humidity: ChannelAccumulator::new(humidity_bounds),
        }
    }

    fn add(&mut self, sample: &SensorSample) {
        self.temperature.add(sample.temperature_c, sample.time_delta_hours);
        self.humidity.add(sample.humidity_percent, sample.time_delta_hours);
    }
}

/// Per-day and total min/max/mean and out-of-bounds time.
pub fn calculate_sensor_stats(
    samples: &[SensorSample],
    temperature_bounds: SensorBounds,
    humidity_bounds: SensorBounds,
) -> SensorStats {
    let mut total = PairAccumulator::new(temperature_bounds, humidity_bounds);
    let mut days: BTreeMap<NaiveDate, PairAccumulator> = BTreeMap::new();

    for sample in samples {
        total.add(sample);
        days.entry(sample.timestamp.date())
            .or_insert_with(|| PairAccumulator::new(temperature_bounds, humidity_bounds))
            .add(sample);
    }

    SensorStats {
        daily: days
            .into_iter()
            .map(|(date, acc)| SensorDayStats {
                date,
                temperature: acc.temperature.finish(),
                humidity: acc.humidity.finish(),
            })
            .collect(),
        total: SensorTotals {
            temperature: total.temperature.finish(),
            humidity: total.humidity.finish(),
        },
    }
}
