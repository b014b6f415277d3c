// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconstruction pipeline
//!
//! One synchronous invocation per building: subtract attached walls,
//! repair courtyard roofs, weld the surface set, triangulate into a mesh
//! and measure. No stage aborts the run; degenerate elements are skipped
//! locally and diagnostic flags on the result tell downstream consumers
//! how much to trust the numbers.

use crate::attached::{subtract_attached_walls, AttachedWallOutcome, AttachedWallParams};
use crate::dormer::{cluster_points, extrude_to_roof, model_footprints, DormerParams};
use crate::measure::{
    average_roof_pitch, compute_volumes, facade_measurement, gross_floor_area, FacadeMeasurement,
    VolumeParams, VolumeResult,
};
use lod2_solid_core::{BuildingDataset, BuildingId, BuildingModel, FootprintIndex, NeighborSource, Ring};
use lod2_solid_geometry::{
    assemble, split_courtyard_roofs, triangulate_rings, weld_surfaces, CourtyardParams, Mesh,
    WeldParams,
};
use nalgebra::{Point2, Point3};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, debug_span, warn};

/// All tunables of one reconstruction run. Tolerances are explicit
/// parameters, never global state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconstructionParams {
    pub attached: AttachedWallParams,
    pub courtyard: CourtyardParams,
    pub weld: WeldParams,
    pub volume: VolumeParams,
    pub dormer: DormerParams,
    pub marker: MarkerParams,
}

/// Tunables for facade reference markers
#[derive(Debug, Clone, Copy)]
pub struct MarkerParams {
    /// Directions below this facade area emit no marker
    pub area_threshold: f64,
    /// Markers are raised to approximate eye height
    pub eye_height: f64,
}

impl Default for MarkerParams {
    fn default() -> Self {
        Self {
            area_threshold: 10.0,
            eye_height: 1.5,
        }
    }
}

/// Everything one reconstruction run produces for downstream consumers
#[derive(Debug, Clone, Serialize)]
pub struct ReconstructionResult {
    pub building_id: BuildingId,
    /// Ground rings, welded
    pub ground: Vec<Ring>,
    /// Roof rings after courtyard splitting and welding
    pub roofs: Vec<Ring>,
    /// Wall rings with attached neighbor walls subtracted, welded
    pub external_walls: Vec<Ring>,
    /// Combined envelope mesh
    pub mesh: Mesh,
    pub facade: FacadeMeasurement,
    pub volumes: VolumeResult,
    pub ground_area: f64,
    pub roof_area: f64,
    /// Area-weighted average roof pitch in degrees
    pub roof_pitch_deg: Option<f64>,
    pub gross_floor_area: Option<f64>,
    /// True when the storey count behind `gross_floor_area` was estimated
    /// from the measured height
    pub gross_floor_area_estimated: bool,
    pub neighbor_ids: Vec<BuildingId>,
    pub neighbor_geometries: Vec<Vec<Ring>>,
    pub surrounding_ids: Vec<BuildingId>,
    pub surrounding_geometries: Vec<Vec<Ring>>,
    /// False when the welder hit its tolerance cap without reaching full
    /// connectivity; volumes are then lower-confidence
    pub weld_repaired: bool,
    pub weld_tolerance: f64,
    pub mesh_watertight: bool,
}

/// Reconstruct a single building.
///
/// `extrusion_points` optionally carries laser points above the roof
/// planes (already filtered upstream) to model dormers into the
/// roof-geometry list before attic-volume calculation.
pub fn reconstruct(
    model: &BuildingModel,
    index: &FootprintIndex,
    source: &impl NeighborSource,
    extrusion_points: Option<&[Point3<f64>]>,
    params: &ReconstructionParams,
) -> ReconstructionResult {
    let span = debug_span!("reconstruct", building = %model.id);
    let _enter = span.enter();

    let ground_centroid = model
        .ground_centroid()
        .unwrap_or_else(|| fallback_centroid(model));
    let reference = Point2::new(ground_centroid.x, ground_centroid.y);

    // 1. Shared party walls out
    let attached: AttachedWallOutcome = subtract_attached_walls(
        &model.walls,
        &reference,
        &model.id,
        index,
        source,
        &params.attached,
    );
    debug!(
        external_walls = attached.external_walls.len(),
        neighbors = attached.neighbor_ids.len(),
        surrounding = attached.surrounding_ids.len(),
        "attached walls resolved"
    );

    // 2. Courtyard roofs into simple polygons
    let roofs = split_courtyard_roofs(&model.roofs, &params.courtyard);

    // 3. Weld the three surface kinds into one connected set
    let welded = weld_surfaces(&model.ground, &roofs, &attached.external_walls, &params.weld);
    if !welded.repaired {
        warn!(
            building = %model.id,
            tolerance = welded.tolerance,
            "geometry could not be fully repaired; proceeding best-effort"
        );
    }

    // 4. Triangulate and assemble the envelope mesh
    let wall_tris = triangulate_rings(&welded.walls);
    let roof_tris = triangulate_rings(&welded.roofs);
    let ground_tris = triangulate_rings(&welded.ground);
    let mesh = assemble(&wall_tris, &roof_tris, &ground_tris);
    let mesh_watertight = mesh.is_watertight();
    debug!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        watertight = mesh_watertight,
        "envelope mesh assembled"
    );

    // 5. Optional dormer modeling from laser points
    let mut attic_roofs = welded.roofs.clone();
    if let Some(points) = extrusion_points.filter(|p| !p.is_empty()) {
        let clusters = cluster_points(points, params.dormer.cluster_threshold);
        let tops = model_footprints(&clusters, params.dormer.min_footprint_area);
        let skirts = extrude_to_roof(&tops, &welded.roofs);
        debug!(dormers = tops.len(), "modeled roof extrusions from laser points");
        attic_roofs.extend(tops);
        attic_roofs.extend(skirts.into_iter().flatten());
    }

    // 6. Measure
    let ground_area: f64 = model.ground.iter().map(lod2_solid_geometry::ring_area).sum();
    let roof_area: f64 = model.roofs.iter().map(lod2_solid_geometry::ring_area).sum();
    let height = model.attributes.measured_height.unwrap_or_else(|| {
        let h = mesh
            .bounds()
            .map(|(min, max)| max.z - min.z)
            .unwrap_or(0.0);
        debug!(height = h, "no measured height; using mesh extent");
        h
    });

    let facade = facade_measurement(
        &welded.walls,
        &mesh,
        &ground_centroid,
        params.marker.area_threshold,
        params.marker.eye_height,
    );

    let volumes = compute_volumes(
        &mesh,
        &attic_roofs,
        model.attributes.roof_type,
        ground_area,
        height,
        &params.volume,
    );

    let roof_pitch_deg = average_roof_pitch(&model.roofs);
    let (gfa, gfa_estimated) = gross_floor_area(
        ground_area,
        model.attributes.storeys,
        model.attributes.measured_height,
    )
    .map_or((None, false), |(v, est)| (Some(v), est));

    ReconstructionResult {
        building_id: model.id.clone(),
        ground: welded.ground,
        roofs: welded.roofs,
        external_walls: welded.walls,
        mesh,
        facade,
        volumes,
        ground_area,
        roof_area,
        roof_pitch_deg,
        gross_floor_area: gfa,
        gross_floor_area_estimated: gfa_estimated,
        neighbor_ids: attached.neighbor_ids,
        neighbor_geometries: attached.neighbor_geometries,
        surrounding_ids: attached.surrounding_ids,
        surrounding_geometries: attached.surrounding_geometries,
        weld_repaired: welded.repaired,
        weld_tolerance: welded.tolerance,
        mesh_watertight,
    }
}

/// Reconstruct every building of a dataset. Buildings are independent,
/// so the work fans out across threads; results come back in id order.
pub fn reconstruct_all(
    dataset: &BuildingDataset,
    params: &ReconstructionParams,
) -> Vec<ReconstructionResult> {
    let index = FootprintIndex::from_models(dataset.iter());
    let mut models: Vec<&BuildingModel> = dataset.iter().collect();
    models.sort_by(|a, b| a.id.cmp(&b.id));

    models
        .par_iter()
        .map(|model| reconstruct(model, &index, dataset, None, params))
        .collect()
}

/// Mean of all surface vertices, for buildings without a ground ring
fn fallback_centroid(model: &BuildingModel) -> Point3<f64> {
    let mut sum = nalgebra::Vector3::zeros();
    let mut count = 0usize;
    for ring in model
        .ground
        .iter()
        .chain(model.roofs.iter())
        .chain(model.walls.iter())
    {
        for p in ring.open_points() {
            sum += p.coords;
            count += 1;
        }
    }
    if count == 0 {
        Point3::origin()
    } else {
        Point3::from(sum / count as f64)
    }
}
