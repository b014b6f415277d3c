// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LOD2-Solid Core
//!
//! Value types shared by the reconstruction pipeline: rings, surfaces,
//! building models and the 2D footprint index used for neighbor queries.
//! Parsing of the source CityGML files is out of scope; this crate only
//! models the in-memory geometry the parser hands over.

pub mod footprint;
pub mod types;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use footprint::FootprintIndex;
pub use types::{
    BuildingAttributes, BuildingDataset, BuildingId, BuildingModel, NeighborSource,
    NeighborSurfaces, PointKey, Ring, RoofType, Surface, SurfaceKind,
};
