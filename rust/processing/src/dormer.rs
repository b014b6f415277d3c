// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Roof extrusion modeling from laser points
//!
//! Dormers and similar roof extrusions are absent from the source
//! surfaces but show up as laser points above the roof planes. This
//! module turns an already-filtered set of such points into rectangular
//! top surfaces plus vertical skirt walls down to the roof, which augment
//! the roof-geometry list before attic-volume calculation. Point-cloud
//! filtering itself happens upstream.

use kiddo::{KdTree, SquaredEuclidean};
use lod2_solid_core::Ring;
use lod2_solid_geometry::bool2d::{point_in_contour, signed_area};
use nalgebra::{Point2, Point3};
use tracing::debug;

/// Tunables for extrusion modeling
#[derive(Debug, Clone, Copy)]
pub struct DormerParams {
    /// Maximum gap between points of one extrusion group
    pub cluster_threshold: f64,
    /// Plan-area cutoff; smaller groups are chimneys, dishes or noise
    pub min_footprint_area: f64,
}

impl Default for DormerParams {
    fn default() -> Self {
        Self {
            cluster_threshold: 0.3,
            min_footprint_area: 1.0,
        }
    }
}

/// Group points into connected clusters: two points belong together when
/// a chain of within-threshold hops links them.
pub fn cluster_points(points: &[Point3<f64>], threshold: f64) -> Vec<Vec<Point3<f64>>> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, p) in points.iter().enumerate() {
        tree.add(&[p.x, p.y, p.z], i as u64);
    }

    let mut assigned = vec![false; points.len()];
    let mut clusters = Vec::new();

    for seed in 0..points.len() {
        if assigned[seed] {
            continue;
        }
        let mut cluster = Vec::new();
        let mut stack = vec![seed];
        assigned[seed] = true;
        while let Some(idx) = stack.pop() {
            cluster.push(points[idx]);
            let p = &points[idx];
            for neighbor in tree.within::<SquaredEuclidean>(&[p.x, p.y, p.z], threshold * threshold)
            {
                let j = neighbor.item as usize;
                if !assigned[j] {
                    assigned[j] = true;
                    stack.push(j);
                }
            }
        }
        clusters.push(cluster);
    }
    clusters
}

/// Model each cluster as a closed rectangular top ring: the plan
/// bounding-box corners, each snapped to the nearest actual point for its
/// elevation. Clusters below the area cutoff are dropped.
pub fn model_footprints(clusters: &[Vec<Point3<f64>>], min_area: f64) -> Vec<Ring> {
    let mut tops = Vec::new();

    for cluster in clusters {
        if cluster.len() < 3 {
            continue;
        }

        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in cluster {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }

        let corners = [
            Point2::new(min.x, min.y),
            Point2::new(max.x, min.y),
            Point2::new(max.x, max.y),
            Point2::new(min.x, max.y),
        ];

        let mut points: Vec<Point3<f64>> = corners
            .iter()
            .map(|corner| {
                let nearest = cluster
                    .iter()
                    .min_by(|a, b| {
                        let da = (a.xy() - corner).norm_squared();
                        let db = (b.xy() - corner).norm_squared();
                        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .expect("cluster not empty");
                Point3::new(nearest.x, nearest.y, nearest.z)
            })
            .collect();
        points.push(points[0]);

        let ring = Ring::new(points);
        let area = signed_area(&ring.plan_points()).abs();
        if area > min_area {
            tops.push(ring);
        } else {
            debug!(area, "dropping sub-threshold extrusion footprint");
        }
    }
    tops
}

/// The highest roof plane lying below the given point in plan view
fn roof_z_below(point: &Point3<f64>, roofs: &[Ring]) -> Option<f64> {
    let plan = Point2::new(point.x, point.y);
    let mut best: Option<f64> = None;
    for roof in roofs {
        let contour = roof.plan_points();
        if contour.len() < 3 || !point_in_contour(&plan, &contour) {
            continue;
        }
        let min_z = roof
            .open_points()
            .iter()
            .map(|p| p.z)
            .fold(f64::INFINITY, f64::min);
        if min_z < point.z && best.map_or(true, |b| min_z > b) {
            best = Some(min_z);
        }
    }
    best
}

/// For each edge of each top ring, build the vertical quad wall down to
/// the roof below. Edges without a roof below are skipped.
pub fn extrude_to_roof(tops: &[Ring], roofs: &[Ring]) -> Vec<Vec<Ring>> {
    let mut walls_per_top = Vec::new();
    for top in tops {
        let mut walls = Vec::new();
        let points = &top.points;
        for i in 0..points.len().saturating_sub(1) {
            let p1 = points[i];
            let p2 = points[i + 1];

            let (Some(base1), Some(base2)) = (roof_z_below(&p1, roofs), roof_z_below(&p2, roofs))
            else {
                debug!(edge = i, "no roof below extrusion edge; skipping skirt wall");
                continue;
            };

            walls.push(Ring::new(vec![
                p1,
                p2,
                Point3::new(p2.x, p2.y, base2),
                Point3::new(p1.x, p1.y, base1),
                p1,
            ]));
        }
        walls_per_top.push(walls);
    }
    walls_per_top
}
