// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry value types
//!
//! The source format delivers each building as a loose bag of independent
//! polygonal surfaces. These types carry that data through the pipeline
//! without losing the conventions downstream stages depend on, most
//! importantly the closed/open convention of each ring.

use nalgebra::{Point2, Point3};
use rustc_hash::FxHashMap;

/// Identifier of a building in the source dataset (GML ids are opaque strings)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildingId(String);

impl BuildingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildingId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BuildingId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which part of the envelope a surface belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SurfaceKind {
    Ground,
    Roof,
    Wall,
}

/// Exact-coordinate key for a vertex, used by the weld map.
///
/// Vertices are compared with a tolerance everywhere else; the weld map is
/// the one place where lookups happen by the exact bit pattern of the
/// original coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointKey(u64, u64, u64);

impl PointKey {
    #[inline]
    pub fn of(p: &Point3<f64>) -> Self {
        Self(p.x.to_bits(), p.y.to_bits(), p.z.to_bits())
    }
}

/// One planar polygon boundary: an ordered sequence of 3D points.
///
/// A ring is *closed* when its first and last vertex are exactly equal.
/// Source surfaces arrive in both conventions and every transform must hand
/// the convention back unchanged, because downstream consumers match it
/// against their own surface type's convention.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ring {
    pub points: Vec<Point3<f64>>,
}

impl Ring {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Build a ring from coordinate triples
    pub fn from_coords(coords: &[[f64; 3]]) -> Self {
        Self {
            points: coords.iter().map(|c| Point3::new(c[0], c[1], c[2])).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether first and last vertex are exactly equal
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.points.len() >= 2 && self.points.first() == self.points.last()
    }

    /// Vertices without the closing duplicate (if any)
    #[inline]
    pub fn open_points(&self) -> &[Point3<f64>] {
        if self.is_closed() {
            &self.points[..self.points.len() - 1]
        } else {
            &self.points
        }
    }

    /// Rebuild the ring point-by-point, preserving structure and the
    /// closed/open convention. Used by the welder to substitute coordinates.
    pub fn map_points(&self, mut f: impl FnMut(&Point3<f64>) -> Point3<f64>) -> Ring {
        Ring {
            points: self.points.iter().map(|p| f(p)).collect(),
        }
    }

    /// XY projection of the vertices (closing duplicate dropped)
    pub fn plan_points(&self) -> Vec<Point2<f64>> {
        self.open_points()
            .iter()
            .map(|p| Point2::new(p.x, p.y))
            .collect()
    }
}

/// A ring tagged with its surface kind and owning building
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Surface {
    pub ring: Ring,
    pub kind: SurfaceKind,
    pub building: BuildingId,
}

impl Surface {
    pub fn new(ring: Ring, kind: SurfaceKind, building: BuildingId) -> Self {
        Self { ring, kind, building }
    }
}

/// Roof form codes as used by the source dataset's roof-type attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoofType {
    Flat,
    Monopitch,
    SplitMonopitch,
    Gable,
    Hip,
    HalfHip,
    Mansard,
    Tent,
    Cone,
    Dome,
    Sawtooth,
    Barrel,
    Spire,
    Mixed,
    Other,
}

impl RoofType {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Flat),
            2100 => Some(Self::Monopitch),
            2200 => Some(Self::SplitMonopitch),
            3100 => Some(Self::Gable),
            3200 => Some(Self::Hip),
            3300 => Some(Self::HalfHip),
            3400 => Some(Self::Mansard),
            3500 => Some(Self::Tent),
            3600 => Some(Self::Cone),
            3700 => Some(Self::Dome),
            3800 => Some(Self::Sawtooth),
            3900 => Some(Self::Barrel),
            4000 => Some(Self::Spire),
            5000 => Some(Self::Mixed),
            9999 => Some(Self::Other),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Flat => 1000,
            Self::Monopitch => 2100,
            Self::SplitMonopitch => 2200,
            Self::Gable => 3100,
            Self::Hip => 3200,
            Self::HalfHip => 3300,
            Self::Mansard => 3400,
            Self::Tent => 3500,
            Self::Cone => 3600,
            Self::Dome => 3700,
            Self::Sawtooth => 3800,
            Self::Barrel => 3900,
            Self::Spire => 4000,
            Self::Mixed => 5000,
            Self::Other => 9999,
        }
    }

    /// Display name, matching the source dataset's dictionary
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flat => "Flachdach",
            Self::Monopitch => "Pultdach",
            Self::SplitMonopitch => "Versetztes Pultdach",
            Self::Gable => "Satteldach",
            Self::Hip => "Walmdach",
            Self::HalfHip => "Krüppelwalmdach",
            Self::Mansard => "Mansardendach",
            Self::Tent => "Zeltdach",
            Self::Cone => "Kegeldach",
            Self::Dome => "Kuppeldach",
            Self::Sawtooth => "Sheddach",
            Self::Barrel => "Bogendach",
            Self::Spire => "Turmdach",
            Self::Mixed => "Mischform",
            Self::Other => "Sonstiges",
        }
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        matches!(self, Self::Flat)
    }
}

/// Scalar attributes delivered alongside a building's surfaces
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildingAttributes {
    pub roof_type: Option<RoofType>,
    /// Measured building height above ground, in length units
    pub measured_height: Option<f64>,
    pub storeys: Option<u16>,
    /// Terrain elevation at the building's base
    pub ground_elevation: Option<f64>,
}

/// One building's surfaces and attributes, as handed over by the parser.
///
/// All collections are owned by the reconstruction invocation that consumes
/// them; nothing here is mutated across runs.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildingModel {
    pub id: BuildingId,
    pub ground: Vec<Ring>,
    pub roofs: Vec<Ring>,
    pub walls: Vec<Ring>,
    pub attributes: BuildingAttributes,
}

impl BuildingModel {
    pub fn new(id: BuildingId) -> Self {
        Self {
            id,
            ground: Vec::new(),
            roofs: Vec::new(),
            walls: Vec::new(),
            attributes: BuildingAttributes::default(),
        }
    }

    /// The building's ground footprint ring.
    ///
    /// When a building carries several ground rings only the first one is
    /// used, matching the source data where more than one is an anomaly.
    pub fn footprint(&self) -> Option<&Ring> {
        self.ground.first()
    }

    /// Mean of the footprint's vertices; the pipeline's reference point
    pub fn ground_centroid(&self) -> Option<Point3<f64>> {
        let ring = self.footprint()?;
        let pts = ring.open_points();
        if pts.is_empty() {
            return None;
        }
        let mut sum = Point3::new(0.0, 0.0, 0.0);
        for p in pts {
            sum.x += p.x;
            sum.y += p.y;
            sum.z += p.z;
        }
        let n = pts.len() as f64;
        Some(Point3::new(sum.x / n, sum.y / n, sum.z / n))
    }
}

/// Wall and roof rings of a neighbor candidate
#[derive(Debug, Clone)]
pub struct NeighborSurfaces {
    pub walls: Vec<Ring>,
    pub roofs: Vec<Ring>,
}

impl NeighborSurfaces {
    /// Combined wall + roof rings, the shape stored for visualization
    pub fn combined(&self) -> Vec<Ring> {
        let mut rings = self.walls.clone();
        rings.extend(self.roofs.iter().cloned());
        rings
    }
}

/// Source of neighbor-building surfaces for the attached-wall resolver.
///
/// Implementations re-extract the wall and roof rings for a candidate id;
/// returning `None` means the candidate's data is missing or malformed and
/// the resolver drops it from consideration.
pub trait NeighborSource {
    fn neighbor_surfaces(&self, id: &BuildingId) -> Option<NeighborSurfaces>;
}

/// All buildings of one source dataset, keyed by id
#[derive(Debug, Clone, Default)]
pub struct BuildingDataset {
    buildings: FxHashMap<BuildingId, BuildingModel>,
}

impl BuildingDataset {
    pub fn new() -> Self {
        Self {
            buildings: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, model: BuildingModel) {
        self.buildings.insert(model.id.clone(), model);
    }

    pub fn get(&self, id: &BuildingId) -> Option<&BuildingModel> {
        self.buildings.get(id)
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildingModel> {
        self.buildings.values()
    }
}

impl NeighborSource for BuildingDataset {
    fn neighbor_surfaces(&self, id: &BuildingId) -> Option<NeighborSurfaces> {
        let model = self.buildings.get(id)?;
        if model.walls.is_empty() && model.roofs.is_empty() {
            return None;
        }
        Some(NeighborSurfaces {
            walls: model.walls.clone(),
            roofs: model.roofs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_closed_convention() {
        let closed = Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ]);
        assert!(closed.is_closed());
        assert_eq!(closed.open_points().len(), 3);

        let open = Ring::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]);
        assert!(!open.is_closed());
        assert_eq!(open.open_points().len(), 3);
    }

    #[test]
    fn test_ring_map_points_preserves_closure() {
        let closed = Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ]);
        let shifted = closed.map_points(|p| Point3::new(p.x + 1.0, p.y, p.z));
        assert!(shifted.is_closed());
        assert_eq!(shifted.len(), closed.len());
    }

    #[test]
    fn test_point_key_exact() {
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(1.0, 2.0, 3.0 + 1e-15);
        assert_eq!(PointKey::of(&a), PointKey::of(&a.clone()));
        assert_ne!(PointKey::of(&a), PointKey::of(&b));
    }

    #[test]
    fn test_roof_type_codes() {
        assert_eq!(RoofType::from_code(1000), Some(RoofType::Flat));
        assert_eq!(RoofType::from_code(3100), Some(RoofType::Gable));
        assert_eq!(RoofType::from_code(42), None);
        assert!(RoofType::Flat.is_flat());
        assert!(!RoofType::Gable.is_flat());
        assert_eq!(RoofType::Gable.code(), 3100);
        assert_eq!(RoofType::Gable.name(), "Satteldach");
    }

    #[test]
    fn test_surface_tagging() {
        let ring = Ring::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0]]);
        let surface = Surface::new(ring.clone(), SurfaceKind::Wall, BuildingId::from("b1"));
        assert_eq!(surface.kind, SurfaceKind::Wall);
        assert_eq!(surface.ring, ring);
        assert_eq!(surface.building.as_str(), "b1");
    }

    #[test]
    fn test_dataset_neighbor_source() {
        let mut dataset = BuildingDataset::new();
        let mut model = BuildingModel::new(BuildingId::from("b1"));
        model.walls.push(Ring::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
        ]));
        dataset.insert(model);

        let surfaces = dataset.neighbor_surfaces(&BuildingId::from("b1")).unwrap();
        assert_eq!(surfaces.walls.len(), 1);
        assert!(dataset.neighbor_surfaces(&BuildingId::from("nope")).is_none());
    }
}
