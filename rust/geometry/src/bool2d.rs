// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D Boolean Operations
//!
//! Polygon difference and splitting built on the i_overlay crate. The
//! attached-wall resolver subtracts neighbor walls in the subject wall's
//! own plane, and the courtyard splitter cuts polygons-with-holes into
//! simple pieces; both run here, in 2D, where the operations are cheap
//! and robust.

use crate::error::{Error, Result};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::{Point2, Vector2};

/// Minimum area threshold - contours smaller than this are considered degenerate
const MIN_AREA_THRESHOLD: f64 = 1e-10;

/// Cut lines extend this factor beyond the shape's bounding-box diagonal
const CUT_LINE_SCALE: f64 = 3.0;

/// A polygon with optional holes: first contour is the outer boundary,
/// the rest are holes.
pub type Shape2 = Vec<Vec<Point2<f64>>>;

/// Compute the signed area of a 2D contour.
/// Positive = counter-clockwise, Negative = clockwise
pub fn signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    let n = contour.len();
    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y;
        area -= contour[j].x * contour[i].y;
    }
    area * 0.5
}

/// Check if a contour is valid (has area, not degenerate)
pub fn is_valid_contour(contour: &[Point2<f64>]) -> bool {
    contour.len() >= 3 && signed_area(contour).abs() > MIN_AREA_THRESHOLD
}

/// Area centroid of a contour; falls back to the vertex mean for
/// near-degenerate contours
pub fn contour_centroid(contour: &[Point2<f64>]) -> Option<Point2<f64>> {
    if contour.is_empty() {
        return None;
    }
    let area = signed_area(contour);
    if area.abs() > MIN_AREA_THRESHOLD {
        let n = contour.len();
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let p = &contour[i];
            let q = &contour[(i + 1) % n];
            let w = p.x * q.y - q.x * p.y;
            cx += (p.x + q.x) * w;
            cy += (p.y + q.y) * w;
        }
        let f = 1.0 / (6.0 * area);
        return Some(Point2::new(cx * f, cy * f));
    }
    let mut sum = Vector2::zeros();
    for p in contour {
        sum += p.coords;
    }
    Some(Point2::from(sum / contour.len() as f64))
}

/// Check if a point is inside a contour using ray casting
pub fn point_in_contour(point: &Point2<f64>, contour: &[Point2<f64>]) -> bool {
    if contour.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = contour.len();
    let mut j = n - 1;
    for i in 0..n {
        let pi = &contour[i];
        let pj = &contour[j];
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance from a point to a contour's boundary; 0 when the point is inside
pub fn point_to_contour_distance(point: &Point2<f64>, contour: &[Point2<f64>]) -> f64 {
    if point_in_contour(point, contour) {
        return 0.0;
    }
    let n = contour.len();
    let mut min = f64::INFINITY;
    for i in 0..n {
        let a = &contour[i];
        let b = &contour[(i + 1) % n];
        let ab = b - a;
        let len_sq = ab.norm_squared();
        let d = if len_sq < f64::EPSILON {
            (point - a).norm()
        } else {
            let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
            (point - (a + ab * t)).norm()
        };
        if d < min {
            min = d;
        }
    }
    min
}

/// Check whether `inner` lies within `outer`, with a touch tolerance:
/// every inner vertex must be inside the outer contour or within
/// `epsilon` of its boundary. Near-touching boundaries therefore still
/// count as contained.
pub fn contains_with_tolerance(
    outer: &[Point2<f64>],
    inner: &[Point2<f64>],
    epsilon: f64,
) -> bool {
    if !is_valid_contour(outer) || !is_valid_contour(inner) {
        return false;
    }
    if signed_area(inner).abs() >= signed_area(outer).abs() {
        return false;
    }
    inner
        .iter()
        .all(|p| point_to_contour_distance(p, outer) <= epsilon)
}

/// Bounding box of a shape (all contours)
pub fn shape_bounds(shape: &Shape2) -> Option<(Point2<f64>, Point2<f64>)> {
    let mut points = shape.iter().flatten();
    let first = points.next()?;
    let mut min = *first;
    let mut max = *first;
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}

/// Perform 2D boolean difference: subject - clip.
///
/// Returns the outer contour of every resulting piece; holes punched into
/// the result are discarded, which is the behavior the wall subtraction
/// wants (a neighbor wall strictly inside a subject wall does not occur
/// in practice). An empty result means the subject was fully covered.
pub fn difference(
    subject: &[Point2<f64>],
    clip: &[Point2<f64>],
) -> Result<Vec<Vec<Point2<f64>>>> {
    if subject.len() < 3 || clip.len() < 3 {
        return Err(Error::DegenerateRing(
            "difference operands must have at least 3 vertices".to_string(),
        ));
    }

    if !is_valid_contour(subject) {
        return Err(Error::BooleanError(
            "subject contour has no area".to_string(),
        ));
    }

    let subject_paths = vec![contour_to_path(subject)];
    let clip_paths = vec![contour_to_path(clip)];

    let result = subject_paths.overlay(&clip_paths, OverlayRule::Difference, FillRule::EvenOdd);

    let mut pieces = Vec::new();
    for shape in &result {
        if let Some(outer) = shape.first() {
            let contour = path_to_contour(outer);
            if is_valid_contour(&contour) {
                pieces.push(contour);
            }
        }
    }
    Ok(pieces)
}

/// Split a shape (polygon with holes) by the infinite line through
/// `origin` along `direction`.
///
/// Returns the resulting shapes from both sides of the line. Pieces keep
/// whatever holes the cut did not open up, so callers split recursively
/// until every piece is simple.
pub fn split_shape(
    shape: &Shape2,
    origin: &Point2<f64>,
    direction: &Vector2<f64>,
) -> Vec<Shape2> {
    let Some((min, max)) = shape_bounds(shape) else {
        return Vec::new();
    };
    let diag = (max - min).norm();
    if diag <= 0.0 {
        return Vec::new();
    }
    let len = direction.norm();
    let d = if len > 0.0 {
        direction / len
    } else {
        Vector2::new(1.0, 0.0)
    };
    let n = Vector2::new(-d.y, d.x);
    let reach = diag * CUT_LINE_SCALE;

    let subject = shape_to_paths(shape);
    let mut pieces = Vec::new();
    for side in [n, -n] {
        let half_plane = vec![vec![
            point_to_coords(&(origin - d * reach)),
            point_to_coords(&(origin + d * reach)),
            point_to_coords(&(origin + d * reach + side * reach)),
            point_to_coords(&(origin - d * reach + side * reach)),
        ]];
        let clipped = subject.overlay(&half_plane, OverlayRule::Intersect, FillRule::EvenOdd);
        for clipped_shape in &clipped {
            let piece = paths_to_shape(clipped_shape);
            if piece.first().map(|outer| is_valid_contour(outer)).unwrap_or(false) {
                pieces.push(piece);
            }
        }
    }
    pieces
}

// ============================================================================
// Internal Helper Functions
// ============================================================================

#[inline]
fn point_to_coords(p: &Point2<f64>) -> [f64; 2] {
    [p.x, p.y]
}

fn contour_to_path(contour: &[Point2<f64>]) -> Vec<[f64; 2]> {
    contour.iter().map(point_to_coords).collect()
}

fn path_to_contour(path: &[[f64; 2]]) -> Vec<Point2<f64>> {
    path.iter().map(|p| Point2::new(p[0], p[1])).collect()
}

fn shape_to_paths(shape: &Shape2) -> Vec<Vec<[f64; 2]>> {
    shape.iter().map(|c| contour_to_path(c)).collect()
}

fn paths_to_shape(paths: &[Vec<[f64; 2]>]) -> Shape2 {
    paths.iter().map(|p| path_to_contour(p)).collect()
}
