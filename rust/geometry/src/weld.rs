// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertex Welder
//!
//! Adjoining source surfaces meet along shared edges whose vertex
//! coordinates are near-identical but not bit-identical. Without welding,
//! triangulation produces a pile of disconnected facets instead of a
//! solid. The welder clusters near-coincident vertices across all three
//! surface kinds at increasing tolerance until the vertex set forms one
//! connected component, replacing each cluster with a single dominant
//! centroid.
//!
//! Ground and roof vertices dominate wall vertices: roof and ground
//! define the authoritative building outline, walls merely connect them.

use kiddo::{KdTree, SquaredEuclidean};
use lod2_solid_core::{PointKey, Ring, SurfaceKind};
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Tunables for the weld tolerance ladder
#[derive(Debug, Clone, Copy)]
pub struct WeldParams {
    pub start_tolerance: f64,
    pub tolerance_step: f64,
    pub max_tolerance: f64,
    /// Fixed radius for the post-weld connectivity check
    pub connectivity_radius: f64,
}

impl Default for WeldParams {
    fn default() -> Self {
        Self {
            start_tolerance: 0.01,
            tolerance_step: 0.01,
            max_tolerance: 1.0,
            connectivity_radius: 0.01,
        }
    }
}

/// Welded surface collections. Ring and point counts are identical to the
/// input; only coordinates change.
#[derive(Debug, Clone)]
pub struct WeldOutcome {
    pub ground: Vec<Ring>,
    pub roofs: Vec<Ring>,
    pub walls: Vec<Ring>,
    /// False when no tolerance up to the cap reached full connectivity;
    /// the collections then hold the best attempt from the last iteration
    pub repaired: bool,
    /// Tolerance of the attempt that produced the output
    pub tolerance: f64,
}

/// Weld ground, roof and wall rings into one connected vertex set.
pub fn weld_surfaces(
    ground: &[Ring],
    roofs: &[Ring],
    walls: &[Ring],
    params: &WeldParams,
) -> WeldOutcome {
    let (points, kinds) = collect_points(ground, roofs, walls);

    if points.is_empty() {
        return WeldOutcome {
            ground: ground.to_vec(),
            roofs: roofs.to_vec(),
            walls: walls.to_vec(),
            repaired: false,
            tolerance: params.start_tolerance,
        };
    }

    let steps = ((params.max_tolerance - params.start_tolerance) / params.tolerance_step)
        .round()
        .max(0.0) as usize;

    let mut last_attempt = None;

    for step in 0..=steps {
        let tolerance = params.start_tolerance + step as f64 * params.tolerance_step;

        let clusters = find_clusters(&points, tolerance);
        let replacements = weld_map(&points, &kinds, &clusters);

        let welded_ground = apply(ground, &replacements);
        let welded_roofs = apply(roofs, &replacements);
        let welded_walls = apply(walls, &replacements);

        let (welded_points, _) = collect_points(&welded_ground, &welded_roofs, &welded_walls);
        if is_connected(&welded_points, params.connectivity_radius) {
            return WeldOutcome {
                ground: welded_ground,
                roofs: welded_roofs,
                walls: welded_walls,
                repaired: true,
                tolerance,
            };
        }

        last_attempt = Some((welded_ground, welded_roofs, welded_walls));
    }

    // Tolerance cap exhausted: proceed with the best effort, flagged
    let (welded_ground, welded_roofs, welded_walls) = last_attempt.expect("at least one attempt");
    WeldOutcome {
        ground: welded_ground,
        roofs: welded_roofs,
        walls: welded_walls,
        repaired: false,
        tolerance: params.start_tolerance + steps as f64 * params.tolerance_step,
    }
}

fn collect_points(
    ground: &[Ring],
    roofs: &[Ring],
    walls: &[Ring],
) -> (Vec<Point3<f64>>, Vec<SurfaceKind>) {
    let mut points = Vec::new();
    let mut kinds = Vec::new();
    for (rings, kind) in [
        (ground, SurfaceKind::Ground),
        (roofs, SurfaceKind::Roof),
        (walls, SurfaceKind::Wall),
    ] {
        for ring in rings {
            for p in &ring.points {
                points.push(*p);
                kinds.push(kind);
            }
        }
    }
    (points, kinds)
}

/// Seed-based clusters: all unvisited neighbors within `tolerance` of the
/// seed vertex (not transitive). Single-member neighborhoods form no
/// cluster.
fn find_clusters(points: &[Point3<f64>], tolerance: f64) -> Vec<SmallVec<[usize; 8]>> {
    let tree = build_tree(points);
    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();

    for i in 0..points.len() {
        if visited[i] {
            continue;
        }
        let query = [points[i].x, points[i].y, points[i].z];
        let mut members: SmallVec<[usize; 8]> = tree
            .within::<SquaredEuclidean>(&query, tolerance * tolerance)
            .into_iter()
            .map(|n| n.item as usize)
            .filter(|&j| !visited[j])
            .collect();
        members.sort_unstable();
        for &j in &members {
            visited[j] = true;
        }
        if members.len() > 1 {
            clusters.push(members);
        }
    }
    clusters
}

/// Replacement map from exact original coordinates to the cluster's
/// dominant centroid
fn weld_map(
    points: &[Point3<f64>],
    kinds: &[SurfaceKind],
    clusters: &[SmallVec<[usize; 8]>],
) -> FxHashMap<PointKey, Point3<f64>> {
    let mut replacements = FxHashMap::default();
    for cluster in clusters {
        let centroid = dominant_centroid(points, kinds, cluster);
        for &idx in cluster {
            replacements.insert(PointKey::of(&points[idx]), centroid);
        }
    }
    replacements
}

/// Ground/roof members dominate wall members: average the ground mean and
/// roof mean when both exist, otherwise whichever exists, otherwise the
/// wall mean.
fn dominant_centroid(
    points: &[Point3<f64>],
    kinds: &[SurfaceKind],
    cluster: &[usize],
) -> Point3<f64> {
    let mean_of = |kind: SurfaceKind| -> Option<Vector3<f64>> {
        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for &idx in cluster {
            if kinds[idx] == kind {
                sum += points[idx].coords;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    };

    let ground = mean_of(SurfaceKind::Ground);
    let roof = mean_of(SurfaceKind::Roof);

    let coords = match (ground, roof) {
        (Some(g), Some(r)) => (g + r) / 2.0,
        (Some(g), None) => g,
        (None, Some(r)) => r,
        (None, None) => mean_of(SurfaceKind::Wall).unwrap_or_else(|| {
            let mut sum = Vector3::zeros();
            for &idx in cluster {
                sum += points[idx].coords;
            }
            sum / cluster.len() as f64
        }),
    };
    Point3::from(coords)
}

fn apply(rings: &[Ring], replacements: &FxHashMap<PointKey, Point3<f64>>) -> Vec<Ring> {
    rings
        .iter()
        .map(|ring| {
            ring.map_points(|p| replacements.get(&PointKey::of(p)).copied().unwrap_or(*p))
        })
        .collect()
}

/// Every vertex must have at least one *other* vertex within `radius`
fn is_connected(points: &[Point3<f64>], radius: f64) -> bool {
    if points.len() < 2 {
        return false;
    }
    let tree = build_tree(points);
    points.iter().all(|p| {
        tree.within::<SquaredEuclidean>(&[p.x, p.y, p.z], radius * radius)
            .len()
            >= 2
    })
}

fn build_tree(points: &[Point3<f64>]) -> KdTree<f64, 3> {
    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, p) in points.iter().enumerate() {
        tree.add(&[p.x, p.y, p.z], i as u64);
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Closed box: ground, flat roof and four walls, with every wall
    /// vertex jittered by up to `jitter` against the authoritative
    /// ground/roof outline.
    fn jittered_box(jitter: f64) -> (Vec<Ring>, Vec<Ring>, Vec<Ring>) {
        let h = 6.0;
        let corners = [
            [0.0, 0.0],
            [10.0, 0.0],
            [10.0, 8.0],
            [0.0, 8.0],
        ];
        let closed_ring = |pts: Vec<[f64; 3]>| {
            let mut coords = pts;
            coords.push(coords[0]);
            Ring::from_coords(&coords)
        };

        let ground = closed_ring(corners.iter().map(|c| [c[0], c[1], 0.0]).collect());
        let roof = closed_ring(corners.iter().rev().map(|c| [c[0], c[1], h]).collect());

        let mut walls = Vec::new();
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            // jitter alternating signs so clusters really have spread
            let j = |k: usize| if k % 2 == 0 { jitter } else { -jitter };
            walls.push(closed_ring(vec![
                [a[0] + j(i), a[1] + j(i + 1), 0.0 + j(i + 2)],
                [b[0] + j(i + 1), b[1] + j(i), 0.0 + j(i + 3)],
                [b[0] + j(i + 2), b[1] + j(i + 3), h + j(i)],
                [a[0] + j(i + 3), a[1] + j(i + 2), h + j(i + 1)],
            ]));
        }
        (vec![ground], vec![roof], walls)
    }

    #[test]
    fn test_weld_closes_jittered_box_at_first_tolerance() {
        let (ground, roofs, walls) = jittered_box(0.005);
        let outcome = weld_surfaces(&ground, &roofs, &walls, &WeldParams::default());

        assert!(outcome.repaired);
        assert!(outcome.tolerance <= 0.01 + 1e-12);

        // Shared corners are now bit-identical across surface kinds
        let ground_keys: Vec<PointKey> =
            outcome.ground[0].points.iter().map(PointKey::of).collect();
        for wall in &outcome.walls {
            for p in wall.points.iter().filter(|p| p.z.abs() < 0.5) {
                assert!(
                    ground_keys.contains(&PointKey::of(p)),
                    "wall base vertex not welded onto ground outline"
                );
            }
        }
    }

    #[test]
    fn test_weld_preserves_structure() {
        let (ground, roofs, walls) = jittered_box(0.004);
        let outcome = weld_surfaces(&ground, &roofs, &walls, &WeldParams::default());
        assert_eq!(outcome.ground.len(), ground.len());
        assert_eq!(outcome.roofs.len(), roofs.len());
        assert_eq!(outcome.walls.len(), walls.len());
        for (w, original) in outcome.walls.iter().zip(walls.iter()) {
            assert_eq!(w.len(), original.len());
            assert_eq!(w.is_closed(), original.is_closed());
        }
    }

    #[test]
    fn test_dominant_centroid_prefers_ground_and_roof() {
        let ground = vec![Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ])];
        let roofs = vec![Ring::from_coords(&[
            [0.0, 0.0, 0.008],
            [1.0, 0.0, 0.008],
            [1.0, 1.0, 0.008],
            [0.0, 0.0, 0.008],
        ])];
        // Wall vertex far off to one side; must not shift the centroid
        let walls = vec![Ring::from_coords(&[
            [0.004, 0.0, 0.004],
            [1.0, 0.0, 0.004],
            [1.0, 1.0, 0.004],
            [0.004, 0.0, 0.004],
        ])];
        let outcome = weld_surfaces(&ground, &roofs, &walls, &WeldParams::default());

        // Ground mean z = 0.0, roof mean z = 0.008 -> welded z = 0.004
        for p in &outcome.ground[0].points {
            assert!((p.z - 0.004).abs() < 1e-12);
        }
        // Wall x offset was ignored in favor of the ground/roof average
        assert!((outcome.walls[0].points[0].x - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_unweldable_geometry_flagged() {
        // Two far-apart triangles with no near-coincident vertices at all
        let a = vec![Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
        ])];
        let b = vec![Ring::from_coords(&[
            [100.0, 0.0, 0.0],
            [101.0, 0.0, 0.0],
            [101.0, 1.0, 0.0],
        ])];
        let outcome = weld_surfaces(&a, &b, &[], &WeldParams::default());
        assert!(!outcome.repaired);
        // Geometry passes through untouched
        assert_eq!(outcome.ground, a);
        assert_eq!(outcome.roofs, b);
    }
}
