use std::collections::HashMap;

use serde::Serialize;

use crate::geometry::distance_km;
use crate::types::Observation;

/// Cells per degree; 100 gives ~1.1 km cells at the equator.
pub const GRID_SCALE: f64 = 100.0;

/// A nearest-point match is only accepted inside this radius.
pub const MAX_MATCH_DISTANCE_M: f64 = 500.0;

/// Integer grid cell of a lat/lon pair.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct GridCell {
    pub lat: i64,
    pub lon: i64,
}

impl GridCell {
    pub fn from_latlon(lat: f64, lon: f64) -> Self {
        GridCell {
            lat: (lat * GRID_SCALE).floor() as i64,
            lon: (lon * GRID_SCALE).floor() as i64,
        }
    }

    /// The 3x3 block centred on this cell, row by row from (-1, -1).
    pub fn neighborhood(&self) -> [GridCell; 9] {
        let mut cells = [*self; 9];
        let mut k = 0;
        for d_lat in -1..=1 {
            for d_lon in -1..=1 {
                cells[k] = GridCell {
                    lat: self.lat.saturating_add(d_lat),
                    lon: self.lon.saturating_add(d_lon),
                };
                k += 1;
            }
        }
        cells
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NearestPoint<'a> {
    pub index: usize,
    pub observation: &'a Observation,
    pub distance_m: f64,
}

/// Uniform hash grid over observation positions.
///
/// Approximate: only the 3x3 neighbourhood of the probe cell is searched,
/// so a match is the closest point *within that window*, accepted only when
/// it lies inside [`MAX_MATCH_DISTANCE_M`]. Rebuild it for every new
/// observation sequence.
#[derive(Clone, Debug, Default)]
pub struct SpatialIndex {
    cells: HashMap<GridCell, Vec<usize>>,
    point_count: usize,
}

impl SpatialIndex {
    pub fn build(observations: &[Observation]) -> Self {
        let mut cells: HashMap<GridCell, Vec<usize>> = HashMap::new();
        for (idx, obs) in observations.iter().enumerate() {
            cells
                .entry(GridCell::from_latlon(obs.latitude, obs.longitude))
                .or_default()
                .push(idx);
        }
        SpatialIndex {
            cells,
            point_count: observations.len(),
        }
    }

    /// Find the observation nearest to `(lat, lon)`.
    ///
    /// `observations` must be the slice the index was built from.
    pub fn find_nearest<'a>(
        &self,
        observations: &'a [Observation],
        lat: f64,
        lon: f64,
    ) -> Option<NearestPoint<'a>> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;

        for cell in GridCell::from_latlon(lat, lon).neighborhood() {
            let Some(indices) = self.cells.get(&cell) else {
                continue;
            };
            for &idx in indices {
                let Some(p) = observations.get(idx) else {
                    continue;
                };
                let d_lat = p.latitude - lat;
                let d_lon = p.longitude - lon;
                let sq_dist = d_lat * d_lat + d_lon * d_lon;
                if best.map_or(true, |(_, min)| sq_dist < min) {
                    best = Some((idx, sq_dist));
                }
            }
        }

        let (index, _) = best?;
        let observation = &observations[index];
        let distance_m = distance_km(lat, lon, observation.latitude, observation.longitude) * 1000.0;
        (distance_m < MAX_MATCH_DISTANCE_M).then_some(NearestPoint {
            index,
            observation,
            distance_m,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }
}
