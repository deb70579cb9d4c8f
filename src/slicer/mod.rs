//! The slicing pipeline: mesh → segments → contours → islands → insets
//! → infill, phase by phase across all layers.
//!
//! Phases run in order with a global barrier between them; inside a
//! phase, work is distributed over layers (or triangle chunks for
//! segment extraction) with rayon. Cross-layer reads only happen in the
//! infill phase, after insets exist everywhere, and are read-only.

use log::{info, warn};
use rayon::prelude::*;

use crate::config::Config;
use crate::float_types::Real;
use crate::geom::{Bounds, Point, Poly, Region, Segment};
use crate::mesh::TriangleMesh;

pub mod infill;
pub mod inset;
pub mod island;
pub mod segment;
pub mod stitch;

/// One connected solid area on a layer: an outer outline, its holes,
/// and everything derived from them.
#[derive(Debug, Clone, Default)]
pub struct Island {
    /// Outer contour plus immediate holes. Outer is counter-clockwise,
    /// holes clockwise.
    pub outlines: Poly,
    /// Bounding box of the outlines, used to prune cross-layer work.
    pub bounds: Bounds,
    /// `shells[0]` is the outermost inset; each further entry sits one
    /// extrusion width deeper. Entries are sets of closed paths.
    pub shells: Vec<Region>,
    /// The area to fill, inside the innermost shell.
    pub infill_boundary: Region,
    /// Thin regions between adjacent shells that need solid fill,
    /// indexed by the outer shell of the pair.
    pub shell_gaps: Vec<Region>,
    /// Clipped fill lines, produced by the infill phase.
    pub solid_infill: Vec<Segment>,
    pub sparse_infill: Vec<Segment>,
}

impl Island {
    pub fn new(outlines: Poly) -> Island {
        let bounds = outlines.bounds();
        Island {
            outlines,
            bounds,
            ..Island::default()
        }
    }

    /// The innermost printed boundary of this island: the deepest
    /// surviving shell, or the infill boundary when no shell exists.
    pub fn innermost(&self) -> &Region {
        self.shells.last().unwrap_or(&self.infill_boundary)
    }
}

/// One horizontal slice of the object.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub index: usize,
    /// Height of the cutting plane (mid-layer).
    pub slice_z: Real,
    /// Height the layer is printed at (its top surface).
    pub print_z: Real,
    /// Raw stage-1 segments; drained by stitching.
    pub segments: Vec<Segment>,
    pub islands: Vec<Island>,
    /// Planned motion, filled by the planner and drained by emission.
    pub moves: Vec<crate::gcode::GMove>,
    /// Estimated seconds to print this layer, acceleration ignored.
    pub time: Real,
}

/// The fully sliced object, ready for motion planning.
#[derive(Debug, Default)]
pub struct SlicedModel {
    pub layers: Vec<Layer>,
    /// Fixed-point XY bounding box of the input mesh.
    pub xy_bounds: Bounds,
}

/// Number of layers for a cropped object height.
pub fn layer_count(height: Real, layer_height: Real) -> usize {
    if height <= 0.0 {
        return 0;
    }
    (height / layer_height).ceil() as usize
}

/// Run pipeline stages 1–6. Consumes the mesh; triangle storage is
/// released as soon as segment extraction is done with it.
pub fn slice(mesh: TriangleMesh, cfg: &Config) -> SlicedModel {
    let n = layer_count(mesh.cropped_height(), cfg.layer_height);
    let mut xy_bounds = Bounds::EMPTY;
    if !mesh.is_empty() {
        xy_bounds.expand(Point::from_mm(mesh.mins.x, mesh.mins.y));
        xy_bounds.expand(Point::from_mm(mesh.maxs.x, mesh.maxs.y));
    }
    let mut layers: Vec<Layer> = (0..n)
        .map(|i| Layer {
            index: i,
            slice_z: i as Real * cfg.layer_height + cfg.layer_height / 2.0,
            print_z: (i + 1) as Real * cfg.layer_height,
            ..Layer::default()
        })
        .collect();
    if n == 0 {
        warn!("object height is zero after cropping, no layers produced");
        return SlicedModel { layers, xy_bounds };
    }

    // stage 1: segments, parallel over triangles
    segment::extract(&mesh, cfg, &mut layers);
    drop(mesh);

    // stages 2 + 3: stitch and organize, parallel over layers
    layers.par_iter_mut().for_each(|layer| {
        let segments = std::mem::take(&mut layer.segments);
        let had_segments = !segments.is_empty();
        let contours = stitch::stitch_layer(segments, layer.index, cfg);
        layer.islands = island::build_islands(contours);
        if had_segments && layer.islands.is_empty() {
            warn!("no closable contours on layer {}", layer.index);
        }
    });

    // stage 4: insets, parallel over layers
    layers
        .par_iter_mut()
        .for_each(|layer| inset::generate(layer, cfg));

    // stage 5: fill patterns, once for the whole object
    let patterns = infill::Patterns::generate(&xy_bounds, cfg);

    // stage 6: clip fill, parallel over layers with read-only access to
    // neighbours; results applied after the barrier
    let fills: Vec<Vec<infill::IslandFill>> = (0..n)
        .into_par_iter()
        .map(|i| infill::compute_layer(&layers, i, &patterns, cfg))
        .collect();
    for (layer, fill) in layers.iter_mut().zip(fills) {
        infill::apply(layer, fill);
    }

    let islands: usize = layers.iter().map(|l| l.islands.len()).sum();
    info!("sliced {} layers, {} islands", n, islands);

    SlicedModel { layers, xy_bounds }
}
