//! Stages 5 and 6: rectilinear fill patterns and their clipping against
//! per-island solid and sparse regions.
//!
//! Patterns are generated once per object over the full XY bounding
//! box, so the stock lines coincide from layer to layer and crossing
//! diagonals alternate by layer parity. Solid regions are derived from
//! the layer neighbourhood: where every layer within roof/floor reach
//! has material, sparse fill suffices; everywhere else the skin must be
//! solid.

use crate::config::Config;
use crate::float_types::{SQRT_2, Unit, to_units};
use crate::geom::clip;
use crate::geom::{Bounds, Point, Region, Segment};

use super::{Island, Layer};

/// The three precomputed line stocks.
#[derive(Debug, Clone, Default)]
pub struct Patterns {
    /// +45°, used on even layers.
    pub even: Vec<Segment>,
    /// −45°, used on odd layers.
    pub odd: Vec<Segment>,
    /// +45° thinned by the infill density.
    pub sparse: Vec<Segment>,
}

impl Patterns {
    pub fn generate(object_bounds: &Bounds, cfg: &Config) -> Patterns {
        if object_bounds.is_empty() {
            return Patterns::default();
        }
        let bounds = object_bounds.inflate(to_units(cfg.edge_width()));
        // line spacing width·√2, measured along the x axis; on the
        // diagonal that puts adjacent beads exactly one width apart
        let solid_step = to_units(cfg.extrusion_width * SQRT_2);
        let even = diagonal_lines(&bounds, solid_step, true);
        let odd = diagonal_lines(&bounds, solid_step, false);
        let sparse = if cfg.infill_density > 0.0 {
            let sparse_step =
                to_units(cfg.extrusion_width * SQRT_2 / cfg.infill_density * 2.0);
            diagonal_lines(&bounds, sparse_step, true)
        } else {
            Vec::new()
        };
        Patterns { even, odd, sparse }
    }
}

/// Lines `x − y = c` (rising) or `x + y = c` (falling), clipped to the
/// box, with `c` stepped on a grid aligned to the origin so patterns
/// with equal step coincide across layers.
fn diagonal_lines(bounds: &Bounds, step: Unit, rising: bool) -> Vec<Segment> {
    if step <= 0 {
        return Vec::new();
    }
    let (c_min, c_max) = if rising {
        (bounds.min.x - bounds.max.y, bounds.max.x - bounds.min.y)
    } else {
        (bounds.min.x + bounds.min.y, bounds.max.x + bounds.max.y)
    };
    let mut lines = Vec::new();
    let mut c = c_min.div_euclid(step) * step;
    while c <= c_max {
        if c >= c_min {
            let (x0, x1) = if rising {
                (bounds.min.x.max(bounds.min.y + c), bounds.max.x.min(bounds.max.y + c))
            } else {
                (bounds.min.x.max(c - bounds.max.y), bounds.max.x.min(c - bounds.min.y))
            };
            if x0 < x1 {
                let (y0, y1) = if rising { (x0 - c, x1 - c) } else { (c - x0, c - x1) };
                lines.push(Segment::new(Point::new(x0, y0), Point::new(x1, y1)));
            }
        }
        c += step;
    }
    lines
}

/// Clipped fill for one island, computed read-only and applied after
/// the phase barrier.
#[derive(Debug, Default)]
pub struct IslandFill {
    pub solid: Vec<Segment>,
    pub sparse: Vec<Segment>,
}

/// Compute fill for every island of layer `index`. Reads neighbouring
/// layers' islands (their innermost shells), never writes.
pub fn compute_layer(
    layers: &[Layer],
    index: usize,
    patterns: &Patterns,
    cfg: &Config,
) -> Vec<IslandFill> {
    let n = layers.len();
    let floor_layers = cfg.floor_layers();
    let roof_layers = cfg.roof_layers();
    let pattern = if index % 2 == 0 {
        &patterns.even
    } else {
        &patterns.odd
    };
    let sliver = cfg.extrusion_width * cfg.fill_threshold / 2.0;
    let rounded = cfg.round_insets;

    layers[index]
        .islands
        .iter()
        .map(|island| {
            let fully_solid = cfg.infill_density >= 1.0
                || index < floor_layers
                || index + roof_layers >= n;

            let (solid_region, sparse_region) = if fully_solid {
                (island.infill_boundary.clone(), Region::default())
            } else if floor_layers == 0 && roof_layers == 0 {
                (Region::default(), island.infill_boundary.clone())
            } else {
                // covered = material present on every neighbour within
                // roof/floor reach; only there may fill stay sparse
                let mut covered = island.infill_boundary.clone();
                let below = (index - floor_layers)..index;
                let above = (index + 1)..=(index + roof_layers);
                for j in below.chain(above) {
                    if covered.is_empty() {
                        break;
                    }
                    covered = clip::intersection(&covered, &neighbour_material(&layers[j], island));
                }
                let mut solid = clip::difference(&island.infill_boundary, &covered);
                let mut sparse = covered;
                if sliver > 0.0 {
                    solid = clip::shrink_regrow(&solid, sliver, rounded);
                    sparse = clip::shrink_regrow(&sparse, sliver, rounded);
                }
                (solid, sparse)
            };

            let mut solid_lines = clip::clip_segments(&solid_region, pattern);
            for gap in &island.shell_gaps {
                solid_lines.extend(clip::clip_segments(gap, pattern));
            }
            let sparse_lines = clip::clip_segments(&sparse_region, &patterns.sparse);

            IslandFill {
                solid: solid_lines,
                sparse: sparse_lines,
            }
        })
        .collect()
}

/// Union of the innermost shells of the neighbour layer's islands that
/// can overlap `island`, pruned by bounding box.
fn neighbour_material(neighbour: &Layer, island: &Island) -> Region {
    clip::union_all(
        neighbour
            .islands
            .iter()
            .filter(|other| other.bounds.intersects(&island.bounds))
            .map(|other| other.innermost().clone()),
    )
}

/// Store computed fill into the layer after the barrier.
pub fn apply(layer: &mut Layer, fills: Vec<IslandFill>) {
    for (island, fill) in layer.islands.iter_mut().zip(fills) {
        island.solid_infill = fill.solid;
        island.sparse_infill = fill.sparse;
    }
}
