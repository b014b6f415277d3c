// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures
//!
//! Indexed triangle mesh in double precision. The measurement engine
//! depends on exact vertex coordinates surviving assembly (welded vertices
//! must stay bit-identical), so vertices are stored as `Point3<f64>` and
//! never rounded.

use lod2_solid_core::PointKey;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;

/// Ray direction for containment tests; deliberately skewed so rays do
/// not run along axis-aligned edges of typical building geometry
const RAY_DIRECTION: [f64; 3] = [0.577_350_269_189_625_8, 0.577_350_269_189_511_3, 0.577_350_269_189_734_2];

/// Triangle mesh
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    /// Vertex positions
    pub vertices: Vec<Point3<f64>>,
    /// Triangle indices (i0, i1, i2)
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn from_parts(vertices: Vec<Point3<f64>>, triangles: Vec<[u32; 3]>) -> Self {
        Self { vertices, triangles }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Merge another mesh into this one, offsetting its indices
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        let offset = self.vertices.len() as u32;
        self.vertices.reserve(other.vertices.len());
        self.triangles.reserve(other.triangles.len());
        self.vertices.extend_from_slice(&other.vertices);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }

    /// Merge vertices with bit-identical coordinates into one index and
    /// drop triangles that collapse in the process.
    ///
    /// Welded surfaces share exact coordinates across their vertex
    /// buffers; merging turns those shared coordinates into true
    /// topological edges, which the watertightness predicate needs.
    pub fn merge_duplicate_vertices(&mut self) {
        let mut lookup: FxHashMap<PointKey, u32> = FxHashMap::default();
        let mut vertices: Vec<Point3<f64>> = Vec::with_capacity(self.vertices.len());
        let mut remap: Vec<u32> = Vec::with_capacity(self.vertices.len());

        for p in &self.vertices {
            let idx = *lookup.entry(PointKey::of(p)).or_insert_with(|| {
                vertices.push(*p);
                (vertices.len() - 1) as u32
            });
            remap.push(idx);
        }

        let triangles = self
            .triangles
            .iter()
            .map(|t| [remap[t[0] as usize], remap[t[1] as usize], remap[t[2] as usize]])
            .filter(|t| t[0] != t[1] && t[1] != t[2] && t[2] != t[0])
            .collect();

        self.vertices = vertices;
        self.triangles = triangles;
    }

    /// Calculate bounds (min, max)
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.vertices {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Some((min, max))
    }

    /// Mean of all vertex positions
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut sum = Vector3::zeros();
        for p in &self.vertices {
            sum += p.coords;
        }
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Largest distance from `point` to any mesh vertex
    pub fn max_distance_from(&self, point: &Point3<f64>) -> f64 {
        self.vertices
            .iter()
            .map(|v| (v - point).norm())
            .fold(0.0, f64::max)
    }

    /// Sum of all triangle areas
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = self.triangle(t);
                0.5 * (b - a).cross(&(c - a)).norm()
            })
            .sum()
    }

    /// Every undirected edge must be shared by exactly two triangles with
    /// opposite directed orientation (consistent winding)
    pub fn is_watertight(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        // (forward, backward) counts per undirected edge
        let mut edges: FxHashMap<(u32, u32), (u32, u32)> = FxHashMap::default();
        for t in &self.triangles {
            if t[0] == t[1] || t[1] == t[2] || t[2] == t[0] {
                return false;
            }
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                let entry = if a < b {
                    &mut edges.entry((a, b)).or_insert((0, 0)).0
                } else {
                    &mut edges.entry((b, a)).or_insert((0, 0)).1
                };
                *entry += 1;
            }
        }
        edges.values().all(|&(fwd, bwd)| fwd == 1 && bwd == 1)
    }

    /// Signed volume via the divergence theorem. Only meaningful for a
    /// watertight mesh; the sign reflects the winding convention.
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = self.triangle(t);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }

    /// Unsigned enclosed volume
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Ray-parity containment test.
    ///
    /// Works on the same principle for slightly-open meshes as for
    /// watertight ones, which the facade-normal orientation relies on when
    /// party walls were subtracted from the envelope.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        if self.is_empty() {
            return false;
        }
        let dir = Vector3::new(RAY_DIRECTION[0], RAY_DIRECTION[1], RAY_DIRECTION[2]);
        let mut crossings = 0usize;
        for t in &self.triangles {
            let [a, b, c] = self.triangle(t);
            if ray_hits_triangle(point, &dir, a, b, c) {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }

    #[inline]
    fn triangle(&self, t: &[u32; 3]) -> [&Point3<f64>; 3] {
        [
            &self.vertices[t[0] as usize],
            &self.vertices[t[1] as usize],
            &self.vertices[t[2] as usize],
        ]
    }
}

/// Möller-Trumbore ray/triangle intersection, forward hits only
fn ray_hits_triangle(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> bool {
    const EPS: f64 = 1e-12;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < EPS {
        return false;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    e2.dot(&q) * inv > EPS
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Axis-aligned unit cube with outward-facing windings
    pub(crate) fn unit_cube() -> Mesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let triangles = vec![
            // bottom (z=0, facing -z)
            [0, 2, 1],
            [0, 3, 2],
            // top (z=1, facing +z)
            [4, 5, 6],
            [4, 6, 7],
            // front (y=0)
            [0, 1, 5],
            [0, 5, 4],
            // right (x=1)
            [1, 2, 6],
            [1, 6, 5],
            // back (y=1)
            [2, 3, 7],
            [2, 7, 6],
            // left (x=0)
            [3, 0, 4],
            [3, 4, 7],
        ];
        Mesh::from_parts(vertices, triangles)
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert!(!mesh.is_watertight());
        assert!(!mesh.contains(&Point3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_cube_watertight_and_volume() {
        let cube = unit_cube();
        assert!(cube.is_watertight());
        assert_relative_eq!(cube.volume(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(cube.area(), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_open_mesh_not_watertight() {
        let mut cube = unit_cube();
        cube.triangles.pop();
        assert!(!cube.is_watertight());
    }

    #[test]
    fn test_contains() {
        let cube = unit_cube();
        assert!(cube.contains(&Point3::new(0.5, 0.5, 0.5)));
        assert!(!cube.contains(&Point3::new(1.5, 0.5, 0.5)));
        assert!(!cube.contains(&Point3::new(-0.1, 0.2, 0.3)));
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = unit_cube();
        let mut b = unit_cube();
        for v in &mut b.vertices {
            v.x += 5.0;
        }
        a.merge(&b);
        assert_eq!(a.vertex_count(), 16);
        assert_eq!(a.triangle_count(), 24);
        assert!(a.contains(&Point3::new(5.5, 0.5, 0.5)));
        assert_relative_eq!(a.signed_volume().abs(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_max_distance_from() {
        let cube = unit_cube();
        let d = cube.max_distance_from(&Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(d, 3.0f64.sqrt(), epsilon = 1e-12);
    }
}
