// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Measurement Engine
//!
//! Oriented facade areas binned into the eight compass directions,
//! reference marker points for facade photography, and the enclosed
//! volume split into model, basement and attic. Mesh-derived volumes are
//! sanity-checked against a closed-form extrusion estimate so that
//! triangulation or welding artifacts can never leave the result absurd.

use lod2_solid_core::{Ring, RoofType};
use lod2_solid_geometry::polygon::{ring_area, ring_pitch_deg};
use lod2_solid_geometry::{bool2d, triangulate_ring, Mesh};
use nalgebra::{Point3, Vector3};
use serde::Serialize;
use tracing::{debug, warn};

/// Walls below this area are skipped as degenerate
const MIN_WALL_AREA: f64 = 1e-6;

/// Wall normals must lie mostly in the XY plane
const MAX_WALL_NORMAL_Z: f64 = 0.5;

/// Offset along the candidate normal for the inside/outside test
const ORIENTATION_PROBE_OFFSET: f64 = 0.1;

/// Roof facets with less elevation range than this are flat
const FLAT_FACET_EPSILON: f64 = 1e-6;

/// The eight compass directions, in tie-breaking order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CardinalDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CardinalDirection {
    pub const ALL: [CardinalDirection; 8] = [
        Self::N,
        Self::NE,
        Self::E,
        Self::SE,
        Self::S,
        Self::SW,
        Self::W,
        Self::NW,
    ];

    /// Unit reference vector in the horizontal plane (north = +y)
    pub fn reference_vector(&self) -> Vector3<f64> {
        let d = std::f64::consts::FRAC_1_SQRT_2;
        match self {
            Self::N => Vector3::new(0.0, 1.0, 0.0),
            Self::NE => Vector3::new(d, d, 0.0),
            Self::E => Vector3::new(1.0, 0.0, 0.0),
            Self::SE => Vector3::new(d, -d, 0.0),
            Self::S => Vector3::new(0.0, -1.0, 0.0),
            Self::SW => Vector3::new(-d, -d, 0.0),
            Self::W => Vector3::new(-1.0, 0.0, 0.0),
            Self::NW => Vector3::new(-d, d, 0.0),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::N => "N",
            Self::NE => "NE",
            Self::E => "E",
            Self::SE => "SE",
            Self::S => "S",
            Self::SW => "SW",
            Self::W => "W",
            Self::NW => "NW",
        }
    }
}

/// Accumulated facade data for one compass direction
#[derive(Debug, Clone, Serialize)]
pub struct DirectionBucket {
    pub direction: CardinalDirection,
    /// Summed area of the member walls
    pub area: f64,
    /// Mean of the member walls' outward normals
    pub average_normal: Vector3<f64>,
    /// Member wall rings
    pub walls: Vec<Ring>,
    /// Reference point for facade photography, if the direction carries
    /// enough area
    pub marker: Option<Point3<f64>>,
}

/// Facade areas by direction plus the total external wall area
#[derive(Debug, Clone, Serialize)]
pub struct FacadeMeasurement {
    /// One bucket per compass direction, in `CardinalDirection::ALL` order
    pub buckets: Vec<DirectionBucket>,
    pub total_area: f64,
}

impl FacadeMeasurement {
    pub fn bucket(&self, direction: CardinalDirection) -> &DirectionBucket {
        &self.buckets[CardinalDirection::ALL
            .iter()
            .position(|d| *d == direction)
            .expect("all directions present")]
    }
}

/// Bin every external wall into the compass direction its outward normal
/// matches best, then derive per-direction markers.
///
/// The candidate normal is flipped when a probe point offset along it
/// falls inside the reference mesh, so normals always face away from the
/// building regardless of the source winding.
pub fn facade_measurement(
    external_walls: &[Ring],
    mesh: &Mesh,
    ground_centroid: &Point3<f64>,
    marker_area_threshold: f64,
    marker_eye_height: f64,
) -> FacadeMeasurement {
    let mut areas = [0.0f64; 8];
    let mut normal_sums = [Vector3::<f64>::zeros(); 8];
    let mut members: [Vec<Ring>; 8] = Default::default();
    let mut counts = [0usize; 8];
    let mut total_area = 0.0;

    for wall in external_walls {
        let area = ring_area(wall);
        if area < MIN_WALL_AREA {
            continue;
        }
        let Some(normal) = external_wall_normal(wall, mesh) else {
            debug!("skipping wall without a usable outward normal");
            continue;
        };

        // Argmax of dot products; ties fall to the earlier direction
        let mut best = 0usize;
        let mut best_dot = f64::NEG_INFINITY;
        for (idx, direction) in CardinalDirection::ALL.iter().enumerate() {
            let dot = normal.dot(&direction.reference_vector());
            if dot > best_dot {
                best_dot = dot;
                best = idx;
            }
        }

        areas[best] += area;
        normal_sums[best] += normal;
        members[best].push(wall.clone());
        counts[best] += 1;
        total_area += area;
    }

    let furthest = mesh.max_distance_from(ground_centroid);

    let buckets = CardinalDirection::ALL
        .iter()
        .enumerate()
        .map(|(idx, direction)| {
            let average_normal = if counts[idx] > 0 {
                normal_sums[idx] / counts[idx] as f64
            } else {
                Vector3::zeros()
            };
            let marker = if areas[idx] >= marker_area_threshold {
                direction_marker(
                    &average_normal,
                    ground_centroid,
                    furthest,
                    marker_eye_height,
                )
            } else {
                None
            };
            DirectionBucket {
                direction: *direction,
                area: areas[idx],
                average_normal,
                walls: std::mem::take(&mut members[idx]),
                marker,
            }
        })
        .collect();

    FacadeMeasurement { buckets, total_area }
}

/// Outward unit normal of an external wall.
///
/// Tries vertex triplets until one yields a normal that lies mostly in
/// the horizontal plane; falls back to the mesh-centroid-to-wall
/// direction. Orientation is fixed against the reference mesh.
fn external_wall_normal(wall: &Ring, mesh: &Mesh) -> Option<Vector3<f64>> {
    let points = wall.open_points();
    if points.len() < 3 {
        return None;
    }

    let mut normal = None;
    'scan: for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            for k in (j + 1)..points.len() {
                let n = (points[j] - points[i]).cross(&(points[k] - points[i]));
                let len = n.norm();
                if len <= 1e-6 {
                    continue;
                }
                let n = n / len;
                if n.z.abs() < MAX_WALL_NORMAL_Z {
                    normal = Some(n);
                    break 'scan;
                }
            }
        }
    }

    let centroid = {
        let mut sum = Vector3::zeros();
        for p in points {
            sum += p.coords;
        }
        Point3::from(sum / points.len() as f64)
    };

    let mut normal = normal.or_else(|| {
        // Degenerate triplets all the way down: point away from the mesh
        let mesh_centroid = mesh.centroid()?;
        let mut replacement = centroid - mesh_centroid;
        replacement.z = 0.0;
        let len = replacement.norm();
        if len <= 1e-12 {
            Some(Vector3::new(1.0, 0.0, 0.0))
        } else {
            Some(replacement / len)
        }
    })?;

    let probe = centroid + normal * ORIENTATION_PROBE_OFFSET;
    if mesh.contains(&probe) {
        normal = -normal;
    }
    Some(normal)
}

fn direction_marker(
    average_normal: &Vector3<f64>,
    ground_centroid: &Point3<f64>,
    furthest: f64,
    eye_height: f64,
) -> Option<Point3<f64>> {
    let mut n = *average_normal;
    n.z = 0.0;
    let len = n.norm();
    if len < 1e-9 {
        return None;
    }
    n /= len;
    let mut marker = ground_centroid + n * furthest;
    marker.z += eye_height;
    Some(marker)
}

/// Tunables for volume computation
#[derive(Debug, Clone, Copy)]
pub struct VolumeParams {
    /// Mesh volumes outside `[low, high] x simple_volume` are rejected
    pub sanity_low: f64,
    pub sanity_high: f64,
    /// Assumed basement height below the ground surface
    pub basement_height: f64,
    /// Assumed height of the roof zone for non-flat roofs
    pub roof_zone_height: f64,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            sanity_low: 0.2,
            sanity_high: 1.6,
            basement_height: 2.5,
            roof_zone_height: 4.0,
        }
    }
}

/// Enclosed volumes in cubic length units
#[derive(Debug, Clone, Serialize)]
pub struct VolumeResult {
    /// Main building volume; mesh-derived when plausible, else the
    /// extrusion estimate
    pub model: f64,
    pub basement: f64,
    pub attic: f64,
    /// Whether `model` came from the mesh (false = simple volume
    /// substituted)
    pub mesh_volume_used: bool,
}

/// Compute model, basement and attic volumes.
///
/// The simple extrusion volume is always derived as the sanity baseline:
/// for non-flat roofs an assumed roof zone of `roof_zone_height` is
/// replaced by a half-pyramid approximation.
pub fn compute_volumes(
    mesh: &Mesh,
    roofs: &[Ring],
    roof_type: Option<RoofType>,
    ground_area: f64,
    height: f64,
    params: &VolumeParams,
) -> VolumeResult {
    let is_flat = roof_type.map_or(false, |r| r.is_flat());

    let simple = if is_flat {
        ground_area * height
    } else {
        ground_area * (height - params.roof_zone_height)
            + ground_area * params.roof_zone_height * 0.5
    };

    // A non-watertight mesh has no defined enclosed volume
    let mesh_volume = mesh.volume();
    let plausible = mesh.is_watertight()
        && mesh_volume.is_finite()
        && mesh_volume >= params.sanity_low * simple
        && mesh_volume <= params.sanity_high * simple;

    let (model, mesh_volume_used) = if plausible {
        (mesh_volume, true)
    } else {
        debug!(
            mesh_volume,
            simple, "mesh volume outside sanity bounds; using extrusion estimate"
        );
        (simple, false)
    };

    let basement = ground_area * params.basement_height;

    let attic = if is_flat {
        0.0
    } else {
        roofs
            .iter()
            .map(|ring| attic_facet_volume(ring, params.roof_zone_height))
            .sum()
    };

    VolumeResult {
        model,
        basement,
        attic,
        mesh_volume_used,
    }
}

/// Volume enclosed between one roof facet and the horizontal plane at its
/// lowest vertex: top ring, bottom ring and a quad skirt, meshed closed.
/// A facet whose skirt mesh fails to close falls back to a fixed-ratio
/// estimate for that facet alone.
fn attic_facet_volume(ring: &Ring, roof_zone_height: f64) -> f64 {
    let top = triangulate_ring(ring);
    if top.is_empty() {
        return 0.0;
    }

    let min_z = top.vertices.iter().map(|p| p.z).fold(f64::INFINITY, f64::min);
    let max_z = top.vertices.iter().map(|p| p.z).fold(f64::NEG_INFINITY, f64::max);
    if max_z - min_z < FLAT_FACET_EPSILON {
        return 0.0;
    }

    let n = top.vertices.len() as u32;
    let mut vertices = top.vertices.clone();
    vertices.extend(top.vertices.iter().map(|p| Point3::new(p.x, p.y, min_z)));

    let mut triangles = top.triangles.clone();
    // Bottom: same triangulation, reversed winding, offset indices
    triangles.extend(top.triangles.iter().map(|t| [t[2] + n, t[1] + n, t[0] + n]));
    // Skirt: one quad per top edge, wound against the top boundary
    for i in 0..n {
        let next = (i + 1) % n;
        triangles.push([next, i, n + i]);
        triangles.push([next, n + i, n + next]);
    }

    let mut facet_mesh = Mesh::from_parts(vertices, triangles);
    facet_mesh.merge_duplicate_vertices();

    if facet_mesh.is_watertight() {
        facet_mesh.volume()
    } else {
        let plan_area = bool2d::signed_area(&ring.plan_points()).abs();
        warn!(plan_area, "attic facet mesh not watertight; using fixed-ratio estimate");
        plan_area * roof_zone_height * 0.5
    }
}

/// Area-weighted average roof pitch in degrees; `None` without roof area
pub fn average_roof_pitch(roofs: &[Ring]) -> Option<f64> {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for ring in roofs {
        let area = ring_area(ring);
        if area <= 0.0 {
            continue;
        }
        if let Some(pitch) = ring_pitch_deg(ring) {
            weighted += pitch * area;
            total += area;
        }
    }
    (total > 0.0).then(|| weighted / total)
}

/// Gross floor area: ground area times storey count. When the storey
/// count is missing it is estimated from the measured height at 3.5
/// length units per storey; the boolean marks the estimate.
pub fn gross_floor_area(
    ground_area: f64,
    storeys: Option<u16>,
    measured_height: Option<f64>,
) -> Option<(f64, bool)> {
    match (storeys, measured_height) {
        (Some(s), _) => Some((ground_area * s as f64, false)),
        (None, Some(h)) => Some((ground_area * (h / 3.5).trunc(), true)),
        (None, None) => None,
    }
}
