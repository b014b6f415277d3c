// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Courtyard Roof Splitter
//!
//! Source data models a roof around an interior courtyard as two
//! independent rings: the outer boundary and the courtyard boundary.
//! Taken literally, the courtyard ring becomes a roof facet floating over
//! the void and corrupts area and volume. This module detects rings fully
//! contained in another ring's plan projection, treats them as holes, and
//! cuts the outer ring into simple (hole-free) polygons with straight
//! line cuts through the hole centroid.

use crate::bool2d::{
    contains_with_tolerance, contour_centroid, signed_area, split_shape, Shape2,
};
use lod2_solid_core::Ring;
use nalgebra::{Point2, Point3, Vector2};

/// Tunables for courtyard detection and splitting
#[derive(Debug, Clone, Copy)]
pub struct CourtyardParams {
    /// Buffer tolerance for the containment test (near-touching boundaries)
    pub touch_epsilon: f64,
    /// Absolute sliver-area threshold for split pieces
    pub area_eps_abs: f64,
    /// Sliver-area threshold relative to the outer ring's area
    pub area_eps_rel: f64,
}

impl Default for CourtyardParams {
    fn default() -> Self {
        Self {
            touch_epsilon: 0.02,
            area_eps_abs: 1e-4,
            area_eps_rel: 1e-5,
        }
    }
}

/// Split every roof ring that fully encloses another roof ring in plan
/// view into simple polygons; all other rings pass through unchanged.
///
/// Output rings are lifted back to the outer ring's original plane height
/// and keep the outer ring's closed/open convention. Degenerate rings
/// (no plan area) are dropped.
pub fn split_courtyard_roofs(roofs: &[Ring], params: &CourtyardParams) -> Vec<Ring> {
    if roofs.is_empty() {
        return Vec::new();
    }

    // Plan projections, plane heights and closure flags per ring
    let plans: Vec<Option<Vec<Point2<f64>>>> = roofs
        .iter()
        .map(|ring| {
            let plan = ring.plan_points();
            if plan.len() >= 3 && signed_area(&plan).abs() > 0.0 {
                Some(plan)
            } else {
                None
            }
        })
        .collect();

    let mut output = Vec::new();

    for (i, ring) in roofs.iter().enumerate() {
        let Some(plan) = &plans[i] else {
            continue;
        };

        // Other roof rings fully contained in this one act as hole outlines
        let holes: Vec<&Vec<Point2<f64>>> = plans
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .filter_map(|(_, p)| p.as_ref())
            .filter(|p| contains_with_tolerance(plan, p, params.touch_epsilon))
            .collect();

        if holes.is_empty() {
            output.push(ring.clone());
            continue;
        }

        let mut shape: Shape2 = vec![plan.clone()];
        shape.extend(holes.iter().map(|h| (*h).to_vec()));

        let outer_area = signed_area(plan).abs().max(1.0);
        let sliver = params.area_eps_abs.max(params.area_eps_rel * outer_area);
        let z = ring.points[0].z;
        let want_closed = ring.is_closed();

        for piece in split_into_simple(shape) {
            if signed_area(&piece).abs() < sliver {
                continue;
            }
            output.push(lift_contour(&piece, z, want_closed));
        }
    }

    output
}

/// Cut a shape with holes into hole-free contours by repeated line cuts
fn split_into_simple(shape: Shape2) -> Vec<Vec<Point2<f64>>> {
    let mut queue = vec![shape];
    let mut simple = Vec::new();

    while let Some(current) = queue.pop() {
        if current.len() <= 1 {
            if let Some(outer) = current.into_iter().next() {
                simple.push(outer);
            }
            continue;
        }

        let parts = split_once(&current);
        if parts.len() < 2 {
            // Numerical dead end; keep the outer boundary so the run continues
            simple.push(current.into_iter().next().unwrap());
            continue;
        }
        for part in parts {
            if part.len() > 1 {
                queue.push(part);
            } else if let Some(outer) = part.into_iter().next() {
                simple.push(outer);
            }
        }
    }

    simple
}

/// One split of a shape with at least one hole into two or more pieces.
/// Cut direction: outer centroid towards hole centroid, with an orthogonal
/// fallback; as a last resort the two largest pieces of whichever attempt
/// produced the most are kept.
fn split_once(shape: &Shape2) -> Vec<Shape2> {
    let Some(hole_centroid) = contour_centroid(&shape[1]) else {
        return Vec::new();
    };
    let Some(outer_centroid) = contour_centroid(&shape[0]) else {
        return Vec::new();
    };

    let mut base_dir = hole_centroid - outer_centroid;
    if base_dir.norm() < 1e-12 {
        base_dir = Vector2::new(1.0, 0.0);
    }

    let parts = split_shape(shape, &hole_centroid, &base_dir);
    if parts.len() >= 2 {
        return parts;
    }

    let ortho = Vector2::new(-base_dir.y, base_dir.x);
    let parts = split_shape(shape, &hole_centroid, &ortho);
    if parts.len() >= 2 {
        return parts;
    }

    let mut parts = parts;
    parts.sort_by(|a, b| {
        let area_a = signed_area(&a[0]).abs();
        let area_b = signed_area(&b[0]).abs();
        area_b.partial_cmp(&area_a).unwrap_or(std::cmp::Ordering::Equal)
    });
    parts.truncate(2);
    parts
}

/// Lift a 2D contour to 3D at the given plane height, restoring the
/// requested closure convention
fn lift_contour(contour: &[Point2<f64>], z: f64, want_closed: bool) -> Ring {
    let mut points: Vec<Point3<f64>> = contour.iter().map(|p| Point3::new(p.x, p.y, z)).collect();
    if want_closed {
        if let Some(first) = points.first().copied() {
            points.push(first);
        }
    }
    Ring::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::ring_area;
    use approx::assert_relative_eq;

    fn square_ring(x0: f64, y0: f64, size: f64, z: f64, closed: bool) -> Ring {
        let mut coords = vec![
            [x0, y0, z],
            [x0 + size, y0, z],
            [x0 + size, y0 + size, z],
            [x0, y0 + size, z],
        ];
        if closed {
            coords.push([x0, y0, z]);
        }
        Ring::from_coords(&coords)
    }

    #[test]
    fn test_no_hole_passes_through_once() {
        let roofs = vec![
            square_ring(0.0, 0.0, 10.0, 20.0, true),
            square_ring(30.0, 0.0, 5.0, 18.0, false),
        ];
        let out = split_courtyard_roofs(&roofs, &CourtyardParams::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], roofs[0]);
        assert_eq!(out[1], roofs[1]);
    }

    #[test]
    fn test_courtyard_split_area() {
        let params = CourtyardParams::default();
        let outer = square_ring(0.0, 0.0, 10.0, 20.0, true);
        let inner = square_ring(4.0, 4.0, 2.0, 20.0, true);
        let out = split_courtyard_roofs(&[outer, inner.clone()], &params);

        // The inner ring itself passes through untouched
        assert!(out.contains(&inner));

        // The outer ring became two or more simple pieces whose area sums
        // to the outer minus the courtyard
        let split_area: f64 = out
            .iter()
            .filter(|r| **r != inner)
            .map(ring_area)
            .sum();
        assert!(out.len() >= 3);
        assert_relative_eq!(split_area, 96.0, epsilon = 1e-3);
    }

    #[test]
    fn test_split_preserves_plane_height_and_closure() {
        let outer = square_ring(0.0, 0.0, 10.0, 20.0, true);
        let inner = square_ring(4.0, 4.0, 2.0, 20.0, false);
        let out = split_courtyard_roofs(&[outer, inner.clone()], &CourtyardParams::default());
        for ring in out.iter().filter(|r| **r != inner) {
            assert!(ring.is_closed());
            for p in &ring.points {
                assert_relative_eq!(p.z, 20.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_degenerate_ring_dropped() {
        let line = Ring::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let out = split_courtyard_roofs(&[line], &CourtyardParams::default());
        assert!(out.is_empty());
    }
}
