// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LOD2-Solid Processing
//!
//! The per-building reconstruction pipeline: attached-wall subtraction,
//! courtyard repair, welding, meshing and measurement, wired together in
//! one synchronous invocation per building. Buildings are independent, so
//! whole datasets run in parallel via rayon.

pub mod attached;
pub mod dormer;
pub mod measure;
pub mod pipeline;

pub use attached::{subtract_attached_walls, AttachedWallOutcome, AttachedWallParams};
pub use dormer::DormerParams;
pub use measure::{
    compute_volumes, facade_measurement, CardinalDirection, DirectionBucket, FacadeMeasurement,
    VolumeParams, VolumeResult,
};
pub use pipeline::{
    reconstruct, reconstruct_all, MarkerParams, ReconstructionParams, ReconstructionResult,
};
