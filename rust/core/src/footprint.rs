// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Footprint Index
//!
//! Per-building 2D ground polygons with proximity queries. Built once per
//! source dataset and read-only for the duration of a reconstruction run;
//! the attached-wall resolver uses it to find neighbor candidates.

use crate::types::{BuildingId, BuildingModel};
use nalgebra::Point2;
use rustc_hash::FxHashMap;

/// Map from building id to its ground-surface polygon in plan view
#[derive(Debug, Clone, Default)]
pub struct FootprintIndex {
    footprints: FxHashMap<BuildingId, Vec<Point2<f64>>>,
}

impl FootprintIndex {
    pub fn new() -> Self {
        Self {
            footprints: FxHashMap::default(),
        }
    }

    /// Index the footprints of all buildings in a dataset.
    ///
    /// Only the first ground ring per building is taken; buildings without
    /// a usable ground ring are skipped.
    pub fn from_models<'a>(models: impl IntoIterator<Item = &'a BuildingModel>) -> Self {
        let mut index = Self::new();
        for model in models {
            if let Some(ring) = model.footprint() {
                index.insert(model.id.clone(), ring.plan_points());
            }
        }
        index
    }

    /// Insert a footprint polygon. Degenerate polygons (<3 vertices) are ignored.
    pub fn insert(&mut self, id: BuildingId, polygon: Vec<Point2<f64>>) {
        if polygon.len() >= 3 {
            self.footprints.insert(id, polygon);
        }
    }

    pub fn get(&self, id: &BuildingId) -> Option<&[Point2<f64>]> {
        self.footprints.get(id).map(|p| p.as_slice())
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    /// Every building (other than `exclude`) whose footprint lies within
    /// `radius` of `point`. Distance is 0 when the point falls inside the
    /// polygon. Results are sorted by id so queries are deterministic.
    pub fn neighbors_within(
        &self,
        point: &Point2<f64>,
        radius: f64,
        exclude: &BuildingId,
    ) -> Vec<BuildingId> {
        let mut ids: Vec<BuildingId> = self
            .footprints
            .iter()
            .filter(|&(id, polygon)| {
                id != exclude && polygon_distance(point, polygon) <= radius
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Distance from a point to a polygon: 0 inside, else distance to the boundary
fn polygon_distance(point: &Point2<f64>, polygon: &[Point2<f64>]) -> f64 {
    if point_in_polygon(point, polygon) {
        return 0.0;
    }
    let n = polygon.len();
    let mut min = f64::INFINITY;
    for i in 0..n {
        let d = segment_distance(point, &polygon[i], &polygon[(i + 1) % n]);
        if d < min {
            min = d;
        }
    }
    min
}

/// Ray-casting point-in-polygon test
fn point_in_polygon(point: &Point2<f64>, polygon: &[Point2<f64>]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = &polygon[i];
        let pj = &polygon[j];
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance from a point to a line segment
fn segment_distance(point: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let ap = point - a;
    let len_sq = ab.norm_squared();
    if len_sq < f64::EPSILON {
        return ap.norm();
    }
    let t = (ap.dot(&ab) / len_sq).clamp(0.0, 1.0);
    (point - (a + ab * t)).norm()
}
