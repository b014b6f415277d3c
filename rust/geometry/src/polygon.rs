// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon math
//!
//! Planar area, normals, plane fitting and 2D projection for single rings.
//! Normals come from Newell's method over *all* vertices so the result's
//! orientation follows the ring's winding; a least-squares plane is only
//! the fallback for degenerate rings where Newell collapses.

use lod2_solid_core::Ring;
use nalgebra::{Matrix3, Point2, Point3, SymmetricEigen, Vector3};

/// Below this normal length a ring is treated as degenerate
const NEWELL_EPSILON: f64 = 1e-9;

/// Area of a planar ring via the half cross-product sum.
///
/// Correct for any planar, possibly non-convex ring; returns 0 for
/// degenerate input (fewer than 3 distinct points).
pub fn ring_area(ring: &Ring) -> f64 {
    let pts = ring.open_points();
    if pts.len() < 3 {
        return 0.0;
    }
    let mut cross_sum = Vector3::zeros();
    for i in 0..pts.len() {
        let p = pts[i].coords;
        let q = pts[(i + 1) % pts.len()].coords;
        cross_sum += p.cross(&q);
    }
    0.5 * cross_sum.norm()
}

/// Winding-respecting unit normal via Newell's method.
///
/// Returns `None` when the summed normal is near zero (collinear or
/// otherwise degenerate ring).
pub fn newell_normal(ring: &Ring) -> Option<Vector3<f64>> {
    let pts = ring.open_points();
    if pts.len() < 3 {
        return None;
    }
    let mut normal: Vector3<f64> = Vector3::zeros();
    for i in 0..pts.len() {
        let current = &pts[i];
        let next = &pts[(i + 1) % pts.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    let len = normal.norm();
    if len < NEWELL_EPSILON {
        None
    } else {
        Some(normal / len)
    }
}

/// Plane through a ring: mean-of-vertices origin plus a unit normal.
///
/// The normal follows the ring's winding (Newell). Only when Newell yields
/// a near-zero normal does this fall back to the orientation-agnostic
/// best-fit plane (smallest eigenvector of the covariance matrix).
pub fn fit_plane(ring: &Ring) -> Option<(Point3<f64>, Vector3<f64>)> {
    let origin = ring_centroid(ring)?;
    if let Some(normal) = newell_normal(ring) {
        return Some((origin, normal));
    }
    best_fit_normal(ring.open_points(), &origin).map(|n| (origin, n))
}

/// Mean of the ring's vertices (closing duplicate excluded)
pub fn ring_centroid(ring: &Ring) -> Option<Point3<f64>> {
    let pts = ring.open_points();
    if pts.is_empty() {
        return None;
    }
    let mut sum = Vector3::zeros();
    for p in pts {
        sum += p.coords;
    }
    Some(Point3::from(sum / pts.len() as f64))
}

/// Stable orthonormal in-plane basis for a plane normal.
///
/// The up-vector is world Z, or world Y when the normal is near-vertical,
/// so the basis never degenerates.
pub fn plane_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let up = if normal.z.abs() > 0.99 {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    };
    let u = up.cross(normal).normalize();
    let v = normal.cross(&u);
    (u, v)
}

/// Orthogonal projection of 3D points into a supplied plane basis
pub fn project_to_basis(
    points: &[Point3<f64>],
    origin: &Point3<f64>,
    u: &Vector3<f64>,
    v: &Vector3<f64>,
) -> Vec<Point2<f64>> {
    points
        .iter()
        .map(|p| {
            let d = p - origin;
            Point2::new(d.dot(u), d.dot(v))
        })
        .collect()
}

/// Map 2D plane coordinates back to 3D through the same basis
pub fn lift_from_basis(
    points: &[Point2<f64>],
    origin: &Point3<f64>,
    u: &Vector3<f64>,
    v: &Vector3<f64>,
) -> Vec<Point3<f64>> {
    points
        .iter()
        .map(|p| origin + u * p.x + v * p.y)
        .collect()
}

/// Pitch of a roof facet against the horizontal, in degrees (0 = flat).
///
/// Uses the Newell normal of the whole ring, never a first-triplet plane.
pub fn ring_pitch_deg(ring: &Ring) -> Option<f64> {
    let normal = newell_normal(ring)?;
    let cos_theta = normal.z.abs().clamp(0.0, 1.0);
    Some(cos_theta.acos().to_degrees())
}

/// Best-fit plane normal: eigenvector of the covariance matrix's smallest
/// eigenvalue. Orientation is arbitrary, which is acceptable for the
/// degenerate rings this is reserved for.
fn best_fit_normal(points: &[Point3<f64>], centroid: &Point3<f64>) -> Option<Vector3<f64>> {
    if points.len() < 3 {
        return None;
    }
    let mut covariance = Matrix3::zeros();
    for p in points {
        let d = p - centroid;
        covariance += d * d.transpose();
    }
    let eigen = SymmetricEigen::new(covariance);
    let mut min_idx = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }
    let normal = eigen.eigenvectors.column(min_idx).into_owned();
    let len = normal.norm();
    if len < NEWELL_EPSILON {
        None
    } else {
        Some(normal / len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Ring {
        Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ])
    }

    #[test]
    fn test_unit_square_area() {
        assert_relative_eq!(ring_area(&unit_square()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_area_invariant_under_rotation_of_start() {
        let rotated = Ring::from_coords(&[
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ]);
        assert_relative_eq!(ring_area(&rotated), ring_area(&unit_square()), epsilon = 1e-12);
    }

    #[test]
    fn test_area_invariant_under_reversal() {
        let mut reversed = unit_square();
        reversed.points.reverse();
        assert_relative_eq!(ring_area(&reversed), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_area_degenerate_is_zero() {
        let line = Ring::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        assert_eq!(ring_area(&line), 0.0);
        let collinear = Ring::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert_relative_eq!(ring_area(&collinear), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_newell_normal_follows_winding() {
        let ccw = unit_square();
        let n = newell_normal(&ccw).unwrap();
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);

        let mut cw = unit_square();
        cw.points.reverse();
        let n = newell_normal(&cw).unwrap();
        assert_relative_eq!(n.z, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_newell_degenerate_falls_back_to_best_fit() {
        let collinear = Ring::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert!(newell_normal(&collinear).is_none());
        // Collinear points do not define a plane either way
        let (_, n) = fit_plane(&collinear).unwrap();
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_plane_basis_is_orthonormal() {
        for normal in [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0).normalize(),
        ] {
            let (u, v) = plane_basis(&normal);
            assert_relative_eq!(u.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(u.dot(&v), 0.0, epsilon = 1e-12);
            assert_relative_eq!(u.dot(&normal), 0.0, epsilon = 1e-12);
            assert_relative_eq!(v.dot(&normal), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_project_lift_round_trip() {
        let ring = Ring::from_coords(&[
            [2.0, 0.0, 5.0],
            [3.0, 0.0, 5.0],
            [3.0, 1.0, 6.0],
            [2.0, 1.0, 6.0],
        ]);
        let (origin, normal) = fit_plane(&ring).unwrap();
        let (u, v) = plane_basis(&normal);
        let projected = project_to_basis(ring.open_points(), &origin, &u, &v);
        let lifted = lift_from_basis(&projected, &origin, &u, &v);
        for (a, b) in ring.open_points().iter().zip(lifted.iter()) {
            assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_ring_pitch() {
        assert_relative_eq!(ring_pitch_deg(&unit_square()).unwrap(), 0.0, epsilon = 1e-9);
        // 45 degree shed: rises 1 unit over 1 unit of run
        let shed = Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ]);
        assert_relative_eq!(ring_pitch_deg(&shed).unwrap(), 45.0, epsilon = 1e-9);
    }
}
