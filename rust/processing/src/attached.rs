// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attached Wall Resolver
//!
//! Row houses and other physically attached buildings share party walls
//! with the subject building. Counting those walls as facade would
//! double-book area that is interior in reality, so every neighbor wall
//! that is coplanar (modulo 180 degrees) and close to a subject wall is
//! subtracted from it via a 2D boolean difference in the subject wall's
//! own plane.
//!
//! Buildings contributing at least one attached wall are reported as true
//! neighbors; buildings merely in range are reported as surrounding
//! context and nothing is subtracted for them.

use lod2_solid_core::{BuildingId, FootprintIndex, NeighborSource, Ring};
use lod2_solid_geometry::bool2d;
use lod2_solid_geometry::polygon::{
    fit_plane, lift_from_basis, newell_normal, plane_basis, project_to_basis,
};
use nalgebra::{Point2, Point3, Vector3};
use tracing::debug;

/// Tunables for attached-wall detection
#[derive(Debug, Clone, Copy)]
pub struct AttachedWallParams {
    /// Neighbor candidate search radius around the reference point
    pub search_radius: f64,
    /// Maximum angular difference between wall azimuths, in degrees,
    /// measured modulo 180 (normal sign carries no meaning here)
    pub angle_tolerance_deg: f64,
    /// Maximum vertex-to-vertex distance between two attached walls
    pub distance_tolerance: f64,
}

impl Default for AttachedWallParams {
    fn default() -> Self {
        Self {
            search_radius: 30.0,
            angle_tolerance_deg: 3.0,
            distance_tolerance: 1.5,
        }
    }
}

/// Result of the attached-wall subtraction
#[derive(Debug, Clone)]
pub struct AttachedWallOutcome {
    /// Subject walls with shared area removed; a wall can fragment into
    /// several rings
    pub external_walls: Vec<Ring>,
    /// Buildings that contributed at least one attached wall
    pub neighbor_ids: Vec<BuildingId>,
    pub neighbor_geometries: Vec<Vec<Ring>>,
    /// Buildings in range without any attached wall (context only)
    pub surrounding_ids: Vec<BuildingId>,
    pub surrounding_geometries: Vec<Vec<Ring>>,
}

/// Detect and subtract neighbor walls coincident with the subject
/// building's walls.
pub fn subtract_attached_walls(
    walls: &[Ring],
    reference: &Point2<f64>,
    building: &BuildingId,
    index: &FootprintIndex,
    source: &impl NeighborSource,
    params: &AttachedWallParams,
) -> AttachedWallOutcome {
    let candidate_ids = index.neighbors_within(reference, params.search_radius, building);

    // Re-extract surfaces per candidate; malformed candidates are dropped
    let mut neighbors = Vec::new();
    for id in candidate_ids {
        match source.neighbor_surfaces(&id) {
            Some(surfaces) => neighbors.push((id, surfaces)),
            None => debug!(neighbor = %id, "dropping neighbor candidate without usable surfaces"),
        }
    }

    let subject_azimuths: Vec<Option<f64>> = walls.iter().map(wall_azimuth).collect();

    // Which neighbor walls attach to which subject walls
    let mut attackers: Vec<Vec<Ring>> = vec![Vec::new(); walls.len()];
    let mut has_attached = vec![false; neighbors.len()];

    for (j, (_, surfaces)) in neighbors.iter().enumerate() {
        for neighbor_wall in &surfaces.walls {
            let Some(neighbor_azimuth) = wall_azimuth(neighbor_wall) else {
                continue;
            };
            for (i, subject_wall) in walls.iter().enumerate() {
                let Some(subject_azimuth) = subject_azimuths[i] else {
                    continue;
                };
                if angular_distance_mod180(subject_azimuth, neighbor_azimuth)
                    >= params.angle_tolerance_deg
                {
                    continue;
                }
                if min_vertex_distance(subject_wall, neighbor_wall) <= params.distance_tolerance {
                    attackers[i].push(neighbor_wall.clone());
                    has_attached[j] = true;
                }
            }
        }
    }

    // Classify candidates into true neighbors and surrounding context
    let mut neighbor_ids = Vec::new();
    let mut neighbor_geometries = Vec::new();
    let mut surrounding_ids = Vec::new();
    let mut surrounding_geometries = Vec::new();
    for (j, (id, surfaces)) in neighbors.iter().enumerate() {
        if has_attached[j] {
            neighbor_ids.push(id.clone());
            neighbor_geometries.push(surfaces.combined());
        } else {
            surrounding_ids.push(id.clone());
            surrounding_geometries.push(surfaces.combined());
        }
    }

    // Subtract attached walls difference-by-difference, carrying a
    // worklist of remaining fragments
    let mut external_walls = Vec::new();
    for (i, wall) in walls.iter().enumerate() {
        if attackers[i].is_empty() {
            external_walls.push(wall.clone());
            continue;
        }
        let mut fragments = vec![wall.clone()];
        for attacker in &attackers[i] {
            let mut next = Vec::new();
            for fragment in &fragments {
                next.extend(difference_on_subject_plane(fragment, attacker));
            }
            fragments = next;
        }
        debug!(
            wall = i,
            attached = attackers[i].len(),
            fragments = fragments.len(),
            "subtracted attached neighbor walls"
        );
        external_walls.extend(fragments);
    }

    AttachedWallOutcome {
        external_walls,
        neighbor_ids,
        neighbor_geometries,
        surrounding_ids,
        surrounding_geometries,
    }
}

/// Azimuth of a wall's plan normal against north (0, 1, 0), in degrees.
/// `None` for degenerate walls or walls without a horizontal normal
/// component (those cannot attach to anything meaningfully).
pub fn wall_azimuth(wall: &Ring) -> Option<f64> {
    let mut normal = newell_normal(wall)?;
    normal.z = 0.0;
    let len = normal.norm();
    if len < 1e-9 {
        return None;
    }
    normal /= len;
    let cos_theta = normal.dot(&Vector3::new(0.0, 1.0, 0.0)).clamp(-1.0, 1.0);
    Some(cos_theta.acos().to_degrees())
}

/// Angular difference folded modulo 180 degrees into [0, 90]
fn angular_distance_mod180(a: f64, b: f64) -> f64 {
    let mut d = (a - b).abs() % 180.0;
    if d > 90.0 {
        d = 180.0 - d;
    }
    d
}

/// Minimum distance between any vertex pair of two rings
fn min_vertex_distance(a: &Ring, b: &Ring) -> f64 {
    let mut min = f64::INFINITY;
    for p in a.open_points() {
        for q in b.open_points() {
            let d = (p - q).norm();
            if d < min {
                min = d;
            }
        }
    }
    min
}

/// 2D boolean difference of two walls in the subject wall's plane,
/// lifted back along the same basis. Degenerate subjects and failed
/// boolean operations pass the subject through unmodified.
fn difference_on_subject_plane(subject: &Ring, clip: &Ring) -> Vec<Ring> {
    let Some((origin, normal)) = fit_plane(subject) else {
        return vec![subject.clone()];
    };
    let (u, v) = plane_basis(&normal);

    let subject_2d = project_to_basis(subject.open_points(), &origin, &u, &v);
    let clip_2d = project_to_basis(clip.open_points(), &origin, &u, &v);

    let pieces = match bool2d::difference(&subject_2d, &clip_2d) {
        Ok(pieces) => pieces,
        Err(err) => {
            debug!(%err, "wall difference failed; keeping subject wall");
            return vec![subject.clone()];
        }
    };

    let want_closed = subject.is_closed();
    pieces
        .iter()
        .map(|piece| {
            let mut points: Vec<Point3<f64>> = lift_from_basis(piece, &origin, &u, &v);
            if want_closed {
                if let Some(first) = points.first().copied() {
                    points.push(first);
                }
            }
            Ring::new(points)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lod2_solid_core::{BuildingDataset, BuildingModel};
    use lod2_solid_geometry::ring_area;

    /// Vertical unit-square wall along the x axis at the given y, shifted
    /// by `dy` out of plane
    fn unit_wall(y: f64) -> Ring {
        Ring::from_coords(&[
            [0.0, y, 0.0],
            [1.0, y, 0.0],
            [1.0, y, 1.0],
            [0.0, y, 1.0],
            [0.0, y, 0.0],
        ])
    }

    fn footprint_square(x0: f64, y0: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + 1.0, y0),
            Point2::new(x0 + 1.0, y0 + 1.0),
            Point2::new(x0, y0 + 1.0),
        ]
    }

    fn setup(neighbor_wall: Ring) -> (BuildingDataset, FootprintIndex) {
        let mut dataset = BuildingDataset::new();
        let mut neighbor = BuildingModel::new(BuildingId::from("neighbor"));
        neighbor.walls.push(neighbor_wall);
        neighbor
            .ground
            .push(Ring::from_coords(&[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, -1.0, 0.0],
                [0.0, -1.0, 0.0],
            ]));
        dataset.insert(neighbor);

        let mut index = FootprintIndex::new();
        index.insert(BuildingId::from("subject"), footprint_square(0.0, 0.0));
        index.insert(BuildingId::from("neighbor"), footprint_square(0.0, -1.0));
        (dataset, index)
    }

    #[test]
    fn test_coincident_wall_fully_subtracted() {
        let (dataset, index) = setup(unit_wall(0.0));
        let walls = vec![unit_wall(0.0)];

        let outcome = subtract_attached_walls(
            &walls,
            &Point2::new(0.5, 0.5),
            &BuildingId::from("subject"),
            &index,
            &dataset,
            &AttachedWallParams::default(),
        );

        let external_area: f64 = outcome.external_walls.iter().map(ring_area).sum();
        assert_relative_eq!(external_area, 0.0, epsilon = 1e-9);
        assert_eq!(outcome.neighbor_ids, vec![BuildingId::from("neighbor")]);
        assert!(outcome.surrounding_ids.is_empty());
    }

    #[test]
    fn test_back_face_neighbor_matches_mod_180() {
        // Same wall with reversed winding: azimuths differ by 180 degrees
        // but the fold still detects attachment
        let mut reversed = unit_wall(0.0);
        reversed.points.reverse();
        let (dataset, index) = setup(reversed);
        let walls = vec![unit_wall(0.0)];

        let outcome = subtract_attached_walls(
            &walls,
            &Point2::new(0.5, 0.5),
            &BuildingId::from("subject"),
            &index,
            &dataset,
            &AttachedWallParams::default(),
        );
        let external_area: f64 = outcome.external_walls.iter().map(ring_area).sum();
        assert_relative_eq!(external_area, 0.0, epsilon = 1e-9);
        assert_eq!(outcome.neighbor_ids.len(), 1);
    }

    #[test]
    fn test_in_range_but_unattached_is_surrounding() {
        // Neighbor wall rotated 90 degrees: in range but never attached
        let rotated = Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
        ]);
        let (dataset, index) = setup(rotated);
        let walls = vec![unit_wall(0.0)];

        let outcome = subtract_attached_walls(
            &walls,
            &Point2::new(0.5, 0.5),
            &BuildingId::from("subject"),
            &index,
            &dataset,
            &AttachedWallParams::default(),
        );

        // Wall untouched, neighbor demoted to surrounding context
        assert_eq!(outcome.external_walls.len(), 1);
        assert_relative_eq!(
            ring_area(&outcome.external_walls[0]),
            1.0,
            epsilon = 1e-9
        );
        assert!(outcome.neighbor_ids.is_empty());
        assert_eq!(outcome.surrounding_ids, vec![BuildingId::from("neighbor")]);
    }

    #[test]
    fn test_partial_overlap_fragments_wall() {
        // Neighbor wall covers only the left half of the subject wall
        let half = Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [0.5, 0.0, 0.0],
            [0.5, 0.0, 1.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
        ]);
        let (dataset, index) = setup(half);
        let walls = vec![unit_wall(0.0)];

        let outcome = subtract_attached_walls(
            &walls,
            &Point2::new(0.5, 0.5),
            &BuildingId::from("subject"),
            &index,
            &dataset,
            &AttachedWallParams::default(),
        );
        let external_area: f64 = outcome.external_walls.iter().map(ring_area).sum();
        assert_relative_eq!(external_area, 0.5, epsilon = 1e-9);
        // Fragments keep the subject's closed convention
        for ring in &outcome.external_walls {
            assert!(ring.is_closed());
        }
    }

    #[test]
    fn test_degenerate_subject_wall_passes_through() {
        let degenerate = Ring::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        let (dataset, index) = setup(unit_wall(0.0));

        let outcome = subtract_attached_walls(
            &[degenerate.clone()],
            &Point2::new(0.5, 0.5),
            &BuildingId::from("subject"),
            &index,
            &dataset,
            &AttachedWallParams::default(),
        );
        assert_eq!(outcome.external_walls, vec![degenerate]);
    }

    #[test]
    fn test_angular_distance_fold() {
        assert_relative_eq!(angular_distance_mod180(10.0, 190.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(angular_distance_mod180(0.0, 179.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(angular_distance_mod180(45.0, 135.0), 90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wall_azimuth() {
        // Wall along x axis: normal points along y -> azimuth 0 or 180
        let azimuth = wall_azimuth(&unit_wall(0.0)).unwrap();
        assert!(azimuth.abs() < 1e-9 || (azimuth - 180.0).abs() < 1e-9);

        // Horizontal ring has no plan normal
        let flat = Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
        ]);
        assert!(wall_azimuth(&flat).is_none());
    }
}
