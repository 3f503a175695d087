//! Report pipeline and the seam to presentation.
//!
//! `FuelReport::build` runs the whole derivation for one batch of rows:
//! normalize → detect events and index positions → aggregate, plus the
//! sensor rollups and the track layout. Sensor rollups use the separate
//! sensor rows when given, else the temperature/humidity on fuel rows. A new build replaces everything;
//! there is no incremental merge.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::aggregator::{calculate_stats, FuelStats};
use crate::config::ReportConfig;
use crate::detector::detect_events;
use crate::error::{ReportError, ReportResult};
use crate::normalizer::{normalize_fuel, normalize_sensors, sensor_samples_from_observations};
use crate::sensor_stats::{calculate_sensor_stats, SensorStats};
use crate::spatial_index::{NearestPoint, SpatialIndex};
use crate::track::{segment_track, TrackLayout};
use crate::types::{Event, Observation, RawFuelRecord, RawSensorRecord, SensorSample};

/// Receives the derived model. Implemented by whatever renders it.
pub trait ReportSink {
    fn render_chart(&mut self, observations: &[Observation], sensors: &[SensorSample]);

    fn render_map(&mut self, track: &TrackLayout, events: &[Event]);

    fn render_tables(&mut self, stats: &FuelStats, sensor_stats: &SensorStats, events: &[Event]);

    /// Called when a caller resolves a map probe to an observation.
    fn highlight_point(&mut self, _index: usize, _observation: &Observation) {}
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FuelReport {
    pub config: ReportConfig,
    pub observations: Vec<Observation>,
    pub events: Vec<Event>,
    pub stats: FuelStats,
    pub sensor_samples: Vec<SensorSample>,
    pub sensor_stats: SensorStats,
    pub track: TrackLayout,
    #[serde(skip)]
    index: SpatialIndex,
}

impl FuelReport {
    /// Derive everything from one batch. The config is cloned so it stays
    /// fixed for the whole pass.
    pub fn build(
        fuel_rows: &[RawFuelRecord],
        sensor_rows: &[RawSensorRecord],
        config: &ReportConfig,
    ) -> Self {
        let config = config.clone();

        let observations = normalize_fuel(fuel_rows, config.filter_near_zero_fuel);
        if observations.is_empty() {
            log::warn!("No fuel data for the selected period");
        }

        let events = detect_events(&observations, &config.detection);
        let index = SpatialIndex::build(&observations);
        let stats = calculate_stats(&observations, &events);
        let track = segment_track(&observations, &config.detection.gaps);

        // Without a sensor stream, fall back to readings carried on fuel rows.
        let sensor_samples = if sensor_rows.is_empty() {
            sensor_samples_from_observations(&observations)
        } else {
            normalize_sensors(sensor_rows)
        };
        let sensor_stats = calculate_sensor_stats(
            &sensor_samples,
            config.temperature_bounds,
            config.humidity_bounds,
        );

        log::info!(
            "Report: {} observations, {} events ({} refuel / {} drain), {} days, {} sensor samples",
            observations.len(),
            events.len(),
            stats.total.refuel_count,
            stats.total.drain_count,
            stats.daily.len(),
            sensor_samples.len()
        );

        FuelReport {
            config,
            observations,
            events,
            stats,
            sensor_samples,
            sensor_stats,
            track,
            index,
        }
    }

    /// "No data": nothing survived normalization.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Nearest observation within 500 m of `(lat, lon)`.
    pub fn find_nearest(&self, lat: f64, lon: f64) -> Option<NearestPoint<'_>> {
        self.index.find_nearest(&self.observations, lat, lon)
    }

    /// Resolve a probe and forward the hit to the sink.
    pub fn highlight_nearest<S: ReportSink + ?Sized>(&self, sink: &mut S, lat: f64, lon: f64) -> Option<usize> {
        let hit = self.find_nearest(lat, lon)?;
        sink.highlight_point(hit.index, hit.observation);
        Some(hit.index)
    }

    /// Hand the model to a sink: chart, then map, then tables.
    pub fn publish<S: ReportSink + ?Sized>(&self, sink: &mut S) {
        sink.render_chart(&self.observations, &self.sensor_samples);
        sink.render_map(&self.track, &self.events);
        sink.render_tables(&self.stats, &self.sensor_stats, &self.events);
    }
}

/// Pull the row array out of a report response.
///
/// Rows live either in `res[0].f` or directly in `res`; saved dumps may also
/// be a bare array.
pub fn extract_rows(response: &Value) -> ReportResult<Vec<Value>> {
    if let Value::Array(rows) = response {
        return Ok(rows.clone());
    }
    let res = response
        .get("res")
        .ok_or_else(|| ReportError::InvalidEnvelope("missing `res`".to_string()))?;
    if let Some(Value::Array(rows)) = res.get(0).and_then(|first| first.get("f")) {
        return Ok(rows.clone());
    }
    match res {
        Value::Array(rows) => Ok(rows.clone()),
        other => Err(ReportError::InvalidEnvelope(format!(
            "`res` is {}, expected an array",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Deserialize rows, skipping any that do not fit `T`.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Vec<T> {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect();
    if decoded.len() < total {
        log::debug!("Skipped {} undecodable rows of {}", total - decoded.len(), total);
    }
    decoded
}

/// Read a response or row dump from `.json` or `.json.gz`.
pub fn load_rows(path: &Path) -> ReportResult<Vec<Value>> {
    let file = File::open(path)?;
    let mut text = String::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        BufReader::new(GzDecoder::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    let response: Value = serde_json::from_str(&text)?;
    extract_rows(&response)
}

pub fn load_fuel_records(path: &Path) -> ReportResult<Vec<RawFuelRecord>> {
    Ok(decode_rows(load_rows(path)?))
}

pub fn load_sensor_records(path: &Path) -> ReportResult<Vec<RawSensorRecord>> {
    Ok(decode_rows(load_rows(path)?))
}
