// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LOD2-Solid Geometry Processing
//!
//! Repairs the loose surface sets of a LOD2 building into a single
//! connected envelope: courtyard-roof splitting, vertex welding,
//! earcutr triangulation and indexed mesh assembly, plus the 2D boolean
//! and polygon-math primitives the pipeline builds on.

pub mod bool2d;
pub mod courtyard;
pub mod error;
pub mod mesh;
pub mod polygon;
pub mod triangulate;
pub mod weld;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use courtyard::{split_courtyard_roofs, CourtyardParams};
pub use error::{Error, Result};
pub use mesh::Mesh;
pub use polygon::{fit_plane, newell_normal, plane_basis, ring_area};
pub use triangulate::{assemble, triangulate_ring, triangulate_rings, TriangleSet};
pub use weld::{weld_surfaces, WeldOutcome, WeldParams};
