use geo::{Coord, Line, LineString};
use serde::Serialize;

use crate::gaps::GapThresholds;
use crate::types::Observation;

/// Bounding box of a track, degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrackBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// Route geometry for the map: continuous runs and the gaps between them.
///
/// Coordinates follow geo's convention, `x = lon`, `y = lat`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrackLayout {
    pub segments: Vec<LineString<f64>>,
    pub gaps: Vec<Line<f64>>,
    pub bounds: Option<TrackBounds>,
}

fn coord(o: &Observation) -> Coord<f64> {
    Coord {
        x: o.longitude,
        y: o.latitude,
    }
}

/// Split the route wherever the detector would see a discontinuity.
///
/// Runs with fewer than two points are not drawable and are dropped; every
/// discontinuous step becomes one gap edge.
pub fn segment_track(observations: &[Observation], gaps: &GapThresholds) -> TrackLayout {
    let mut layout = TrackLayout::default();
    let Some(first) = observations.first() else {
        return layout;
    };

    let mut current: Vec<Coord<f64>> = vec![coord(first)];
    for pair in observations.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if gaps.is_discontinuity(prev, cur) {
            if current.len() > 1 {
                layout.segments.push(LineString::new(std::mem::take(&mut current)));
            } else {
                current.clear();
            }
            layout.gaps.push(Line::new(coord(prev), coord(cur)));
        }
        current.push(coord(cur));
    }
    if current.len() > 1 {
        layout.segments.push(LineString::new(current));
    }

    layout.bounds = Some(observations.iter().fold(
        TrackBounds {
            min_lat: f64::INFINITY,
            min_lon: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            max_lon: f64::NEG_INFINITY,
        },
        |b, o| TrackBounds {
            min_lat: b.min_lat.min(o.latitude),
            min_lon: b.min_lon.min(o.longitude),
            max_lat: b.max_lat.max(o.latitude),
            max_lon: b.max_lon.max(o.longitude),
        },
    ));

    log::debug!(
        "Track: {} segments, {} gaps",
        layout.segments.len(),
        layout.gaps.len()
    );
    layout
}
