// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring triangulation and mesh assembly
//!
//! Each welded planar ring becomes a 3D triangle set: fit the ring's
//! plane, project into a stable in-plane basis, run earcutr, and index
//! straight back into the original 3D vertices. Triangulation is
//! vertex-preserving by construction - earcut never inserts points, so
//! the welded coordinates survive bit-identically and the gaps the
//! welder closed stay closed.

use crate::mesh::Mesh;
use crate::polygon::{fit_plane, plane_basis, project_to_basis};
use lod2_solid_core::Ring;
use nalgebra::Point3;

/// Below this projected area a ring is skipped as degenerate
const MIN_PROJECTED_AREA: f64 = 1e-9;

/// Vertices plus triangle indices for one block of surfaces
#[derive(Debug, Clone, Default)]
pub struct TriangleSet {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriangleSet {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Triangulate a single ring into 3D triangles.
///
/// Degenerate rings (fewer than 3 distinct vertices, no plane, or
/// near-zero projected area) return an empty set rather than an error;
/// one bad facet must never abort a whole reconstruction.
pub fn triangulate_ring(ring: &Ring) -> TriangleSet {
    let points = dedup_points(ring.open_points());
    if points.len() < 3 {
        return TriangleSet::default();
    }

    let dedup_ring = Ring::new(points.clone());
    let Some((origin, normal)) = fit_plane(&dedup_ring) else {
        return TriangleSet::default();
    };

    let (u, v) = plane_basis(&normal);
    let projected = project_to_basis(&points, &origin, &u, &v);

    let area = crate::bool2d::signed_area(&projected).abs();
    if area <= MIN_PROJECTED_AREA {
        return TriangleSet::default();
    }

    let mut flat = Vec::with_capacity(projected.len() * 2);
    for p in &projected {
        flat.push(p.x);
        flat.push(p.y);
    }

    let Ok(indices) = earcutr::earcut(&flat, &[], 2) else {
        return TriangleSet::default();
    };
    if indices.is_empty() {
        return TriangleSet::default();
    }

    let triangles = indices
        .chunks_exact(3)
        .map(|t| [t[0] as u32, t[1] as u32, t[2] as u32])
        .collect();

    TriangleSet {
        vertices: points,
        triangles,
    }
}

/// Triangulate a list of rings into one packed set, offsetting indices
/// by the running vertex count
pub fn triangulate_rings(rings: &[Ring]) -> TriangleSet {
    let mut combined = TriangleSet::default();
    for ring in rings {
        let set = triangulate_ring(ring);
        if set.is_empty() {
            continue;
        }
        let offset = combined.vertices.len() as u32;
        combined.vertices.extend(set.vertices);
        combined
            .triangles
            .extend(set.triangles.iter().map(|t| {
                [t[0] + offset, t[1] + offset, t[2] + offset]
            }));
    }
    combined
}

/// Stack wall, roof and ground triangulations into one indexed mesh.
/// Empty blocks are skipped; bit-identical vertices across blocks (the
/// welder's contract for shared edges) are merged into one index so the
/// result can be watertight.
pub fn assemble(walls: &TriangleSet, roofs: &TriangleSet, ground: &TriangleSet) -> Mesh {
    let mut mesh = Mesh::new();
    for block in [walls, roofs, ground] {
        if block.is_empty() {
            continue;
        }
        mesh.merge(&Mesh {
            vertices: block.vertices.clone(),
            triangles: block.triangles.clone(),
        });
    }
    mesh.merge_duplicate_vertices();
    mesh
}

/// Drop consecutive duplicate vertices (welding can collapse neighbors
/// onto the same coordinates)
fn dedup_points(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let mut out: Vec<Point3<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() != Some(p) {
            out.push(*p);
        }
    }
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}
