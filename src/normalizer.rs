//! Raw rows → typed, time-sorted observations.
//!
//! Malformed rows are dropped, never reported as errors: the upstream feed
//! is known to be noisy.

use crate::geometry::distance_km;
use crate::types::{
    hours_between, loose_f64, loose_opt, parse_wdate, Observation, RawFuelRecord,
    RawSensorRecord, SensorSample,
};

/// Fuel level at or below this is a sensor dropout, not an empty tank.
pub const NEAR_ZERO_LITERS: f64 = 0.1;

/// Normalize fuel rows.
///
/// Order matters: invalid GPS fixes go first, then malformed rows, then the
/// optional near-zero filter, then a stable sort by time. Motion fields are
/// computed against the previous *surviving* point.
pub fn normalize_fuel(records: &[RawFuelRecord], filter_near_zero_fuel: bool) -> Vec<Observation> {
    let mut invalid_fix = 0usize;
    let mut malformed = 0usize;
    let mut near_zero = 0usize;

    let mut observations: Vec<Observation> = Vec::with_capacity(records.len());
    for record in records {
        let latitude = loose_f64(record.latitude.as_ref());
        let longitude = loose_f64(record.longitude.as_ref());
        if latitude.is_nan() || longitude.is_nan() || (latitude == 0.0 && longitude == 0.0) {
            invalid_fix += 1;
            continue;
        }

        let timestamp = record.wdate.as_deref().and_then(parse_wdate);
        let liters = loose_f64(record.liters.as_ref());
        let Some(timestamp) = timestamp.filter(|_| !liters.is_nan()) else {
            malformed += 1;
            continue;
        };

        if filter_near_zero_fuel && liters <= NEAR_ZERO_LITERS {
            near_zero += 1;
            continue;
        }

        let mut obs = Observation::new(timestamp, liters, latitude, longitude);
        obs.temperature_c = loose_opt(record.temperature_c.as_ref());
        obs.humidity_percent = loose_opt(record.humidity_percent.as_ref());
        observations.push(obs);
    }

    if invalid_fix + malformed + near_zero > 0 {
        log::debug!(
            "Dropped fuel rows: {} invalid fix, {} malformed, {} near-zero",
            invalid_fix,
            malformed,
            near_zero
        );
    }

    observations.sort_by_key(|o| o.timestamp);
    fill_motion(&mut observations);
    observations
}

/// Recompute distance, elapsed time and speed relative to the previous point.
fn fill_motion(observations: &mut [Observation]) {
    for i in 0..observations.len() {
        if i == 0 {
            let first = &mut observations[0];
            first.distance_km = 0.0;
            first.time_delta_hours = 0.0;
            first.speed_kmh = 0.0;
            continue;
        }
        let prev = observations[i - 1];
        let cur = &mut observations[i];
        let dist = distance_km(prev.latitude, prev.longitude, cur.latitude, cur.longitude);
        let hours = hours_between(prev.timestamp, cur.timestamp);
        cur.distance_km = dist;
        cur.time_delta_hours = hours;
        cur.speed_kmh = if hours > 0.0 { dist / hours } else { 0.0 };
    }
}

/// Normalize environmental rows: drop unparseable timestamps, sort, and
/// fill `time_delta_hours`.
pub fn normalize_sensors(records: &[RawSensorRecord]) -> Vec<SensorSample> {
    let mut samples: Vec<SensorSample> = records
        .iter()
        .filter_map(|record| {
            let timestamp = record.wdate.as_deref().and_then(parse_wdate)?;
            Some(SensorSample {
                timestamp,
                temperature_c: loose_opt(record.temperature_c.as_ref()),
                humidity_percent: loose_opt(record.humidity_percent.as_ref()),
                time_delta_hours: 0.0,
            })
        })
        .collect();

    let dropped = records.len() - samples.len();
    if dropped > 0 {
        log::debug!("Dropped {} sensor rows with unparseable wdate", dropped);
    }

    samples.sort_by_key(|s| s.timestamp);
    fill_sensor_deltas(&mut samples);
    samples
}

/// Sensor samples carried inline on fuel rows, for reports that have no
/// separate sensor stream. Observations with neither reading are skipped.
pub fn sensor_samples_from_observations(observations: &[Observation]) -> Vec<SensorSample> {
    let mut samples: Vec<SensorSample> = observations
        .iter()
        .filter(|o| o.temperature_c.is_some() || o.humidity_percent.is_some())
        .map(|o| SensorSample {
            timestamp: o.timestamp,
            temperature_c: o.temperature_c,
            humidity_percent: o.humidity_percent,
            time_delta_hours: 0.0,
        })
        .collect();
    fill_sensor_deltas(&mut samples);
    samples
}

fn fill_sensor_deltas(samples: &mut [SensorSample]) {
    for i in 1..samples.len() {
        samples[i].time_delta_hours = hours_between(samples[i - 1].timestamp, samples[i].timestamp);
    }
}
