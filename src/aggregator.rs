//! Daily and whole-period fuel rollups.
//!
//! Consumption is a residual: `start - end + refuels - drains`. Any loss
//! not explained by a classified drain (including losses across telemetry
//! gaps and sensor noise) is counted as consumption, so the figure can
//! overstate real engine use. Totals use the global first/last levels
//! rather than summing the daily figures, so when a gap straddles midnight
//! the total differs from the sum of the days.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{Event, EventKind, Observation};

/// Observations and events that fall on one local calendar day.
#[derive(Clone, Debug)]
pub struct DayBucket<'a> {
    pub date: NaiveDate,
    pub observations: Vec<&'a Observation>,
    pub events: Vec<&'a Event>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub start_liters: f64,
    pub end_liters: f64,
    pub refuel_liters: f64,
    pub refuel_count: usize,
    pub drain_liters: f64,
    pub drain_count: usize,
    pub consumption_liters: f64,
    pub distance_km: f64,
    pub engine_hours: f64,
    pub avg_consumption_per_100km: f64,
    pub observation_count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalStats {
    pub start_liters: f64,
    pub end_liters: f64,
    pub refuel_liters: f64,
    pub refuel_count: usize,
    pub drain_liters: f64,
    pub drain_count: usize,
    pub consumption_liters: f64,
    pub distance_km: f64,
    pub engine_hours: f64,
    pub avg_consumption_per_100km: f64,
    pub observation_count: usize,
    pub day_count: usize,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelStats {
    pub daily: Vec<DailyStats>,
    pub total: TotalStats,
}

/// Litres per 100 km, or 0 without distance.
pub fn per_100km(consumption_liters: f64, distance_km: f64) -> f64 {
    if distance_km > 0.0 {
        consumption_liters / distance_km * 100.0
    } else {
        0.0
    }
}

/// Residual consumption. Approximate: fuel lost across a gap or in an
/// undetected event is counted as consumed.
pub fn residual_consumption(start: f64, end: f64, refueled: f64, drained: f64) -> f64 {
    start - end + refueled - drained
}

#[derive(Default)]
struct EventSums {
    refuel_liters: f64,
    refuel_count: usize,
    drain_liters: f64,
    drain_count: usize,
}

impl EventSums {
    fn from_events<'e>(events: impl IntoIterator<Item = &'e Event>) -> Self {
        let mut sums = EventSums::default();
        for e in events {
            match e.kind {
                EventKind::Refuel => {
                    sums.refuel_liters += e.volume_liters;
                    sums.refuel_count += 1;
                }
                EventKind::Drain => {
                    sums.drain_liters += e.volume_liters;
                    sums.drain_count += 1;
                }
            }
        }
        sums
    }
}

/// Group by local calendar day, ordered by date.
///
/// Events go to the day of their end timestamp; an event whose day has no
/// observations is dropped.
pub fn bucket_by_day<'a>(
    observations: &'a [Observation],
    events: &'a [Event],
) -> BTreeMap<NaiveDate, DayBucket<'a>> {
    let mut days: BTreeMap<NaiveDate, DayBucket<'a>> = BTreeMap::new();
    for obs in observations {
        let date = obs.date();
        days.entry(date)
            .or_insert_with(|| DayBucket {
                date,
                observations: Vec::new(),
                events: Vec::new(),
            })
            .observations
            .push(obs);
    }
    for event in events {
        match days.get_mut(&event.date()) {
            Some(day) => day.events.push(event),
            None => log::debug!("Event at {} has no matching day bucket", event.timestamp),
        }
    }
    days
}

impl DailyStats {
    /// Stats for one bucket. Buckets are never empty when produced by
    /// [`bucket_by_day`]; an empty one yields zeros.
    pub fn from_bucket(bucket: &DayBucket<'_>) -> Self {
        let (Some(first), Some(last)) = (bucket.observations.first(), bucket.observations.last())
        else {
            return DailyStats {
                date: bucket.date,
                ..Default::default()
            };
        };

        let sums = EventSums::from_events(bucket.events.iter().copied());
        let distance_km: f64 = bucket.observations.iter().map(|o| o.distance_km).sum();
        let engine_hours: f64 = bucket.observations.iter().map(|o| o.time_delta_hours).sum();
        let consumption = residual_consumption(
            first.liters,
            last.liters,
            sums.refuel_liters,
            sums.drain_liters,
        );

        DailyStats {
            date: bucket.date,
            start_liters: first.liters,
            end_liters: last.liters,
            refuel_liters: sums.refuel_liters,
            refuel_count: sums.refuel_count,
            drain_liters: sums.drain_liters,
            drain_count: sums.drain_count,
            consumption_liters: consumption,
            distance_km,
            engine_hours,
            avg_consumption_per_100km: per_100km(consumption, distance_km),
            observation_count: bucket.observations.len(),
        }
    }
}

impl TotalStats {
    /// Whole-period stats from the full sequence and full event list.
    pub fn compute(observations: &[Observation], events: &[Event], day_count: usize) -> Self {
        let (Some(first), Some(last)) = (observations.first(), observations.last()) else {
            return TotalStats::default();
        };

        let sums = EventSums::from_events(events);
        let distance_km: f64 = observations.iter().map(|o| o.distance_km).sum();
        let engine_hours: f64 = observations.iter().map(|o| o.time_delta_hours).sum();
        let consumption = residual_consumption(
            first.liters,
            last.liters,
            sums.refuel_liters,
            sums.drain_liters,
        );

        TotalStats {
            start_liters: first.liters,
            end_liters: last.liters,
            refuel_liters: sums.refuel_liters,
            refuel_count: sums.refuel_count,
            drain_liters: sums.drain_liters,
            drain_count: sums.drain_count,
            consumption_liters: consumption,
            distance_km,
            engine_hours,
            avg_consumption_per_100km: per_100km(consumption, distance_km),
            observation_count: observations.len(),
            day_count,
            first_timestamp: Some(first.timestamp),
            last_timestamp: Some(last.timestamp),
        }
    }
}

/// Daily and total fuel statistics.
pub fn calculate_stats(observations: &[Observation], events: &[Event]) -> FuelStats {
    let days = bucket_by_day(observations, events);
    let daily: Vec<DailyStats> = days.values().map(DailyStats::from_bucket).collect();
    let total = TotalStats::compute(observations, events, daily.len());
    log::debug!(
        "Aggregated {} observations into {} days, consumption {:.2} L",
        observations.len(),
        daily.len(),
        total.consumption_liters
    );
    FuelStats { daily, total }
}
