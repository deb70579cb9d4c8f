//! Stage 7: turn each layer's islands into an ordered move sequence.
//!
//! Ordering is greedy nearest-first at every level: islands by their
//! closest outline vertex, shells by a distance cost biased toward the
//! preferred inset, infill lines by their closer endpoint. Travels
//! decide retraction from the machine state: entering an island, long
//! hops, and hops that cross the current island's outlines all retract
//! first. Time is accumulated per move as length over feed rate;
//! acceleration is deliberately ignored.

use rayon::prelude::*;

use crate::config::Config;
use crate::float_types::{EPSILON, Real};
use crate::geom::{point_along, segments_cross, Contour, Point, Poly};
use crate::slicer::{Island, Layer, SlicedModel};

pub mod emit;

/// One planned machine move. `de` is the incremental feedstock length;
/// `scalable` marks moves whose feed rate the layer-time governor may
/// reduce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GMove {
    pub x: Real,
    pub y: Real,
    pub z: Real,
    pub de: Real,
    pub feed: Real,
    pub scalable: bool,
}

/// Plan all layers in parallel. Shell and gap storage is released once
/// a layer is planned; islands themselves stay for emission.
pub fn plan(model: &mut SlicedModel, cfg: &Config) {
    let corner = if model.xy_bounds.is_empty() {
        (0.0, 0.0)
    } else {
        (model.xy_bounds.min.x_mm(), model.xy_bounds.min.y_mm())
    };
    model
        .layers
        .par_iter_mut()
        .for_each(|layer| plan_layer(layer, corner, cfg));
}

fn plan_layer(layer: &mut Layer, corner: (Real, Real), cfg: &Config) {
    let mut planner = LayerPlanner {
        cfg,
        z: layer.print_z,
        x: corner.0,
        y: corner.1,
        retracted: true,
        new_island: true,
        e_per_mm: cfg.e_per_mm(),
        moves: Vec::new(),
        time: 0.0,
    };

    let mut pending = std::mem::take(&mut layer.islands);
    while !pending.is_empty() {
        let here = planner.position();
        let next = (0..pending.len())
            .min_by(|&a, &b| {
                let da = island_distance2(here, &pending[a], cfg.align_seams);
                let db = island_distance2(here, &pending[b], cfg.align_seams);
                da.cmp(&db)
            })
            .unwrap();
        let mut island = pending.remove(next);
        planner.new_island = true;
        planner.plan_island(&mut island, layer.index);
        // shells and gaps are spent; islands persist through emission
        island.shells = Vec::new();
        island.shell_gaps = Vec::new();
        layer.islands.push(island);
    }

    planner.finish_layer();
    layer.moves = planner.moves;
    layer.time = planner.time;
}

/// Squared distance from `p` to the island's nearest outline vertex.
/// With seam alignment only each ring's first vertex is considered.
fn island_distance2(p: Point, island: &Island, align_seams: bool) -> i128 {
    let mut best = i128::MAX;
    for ring in island.outlines.rings() {
        if ring.is_empty() {
            continue;
        }
        if align_seams {
            best = best.min(p.dist2(ring.0[0]));
        } else {
            for &v in &ring.0 {
                best = best.min(p.dist2(v));
            }
        }
    }
    best
}

struct LayerPlanner<'a> {
    cfg: &'a Config,
    z: Real,
    x: Real,
    y: Real,
    retracted: bool,
    new_island: bool,
    e_per_mm: Real,
    moves: Vec<GMove>,
    time: Real,
}

impl LayerPlanner<'_> {
    fn position(&self) -> Point {
        Point::from_mm(self.x, self.y)
    }

    fn plan_island(&mut self, island: &mut Island, layer_index: usize) {
        // layer 0 always prints shells first
        let shells_first = layer_index == 0 || !self.cfg.infill_first;
        if shells_first {
            self.plan_shells(island);
            self.plan_infill(island);
        } else {
            self.plan_infill(island);
            self.plan_shells(island);
        }
    }

    fn plan_shells(&mut self, island: &mut Island) {
        let shell_count = island.shells.len();
        if shell_count == 0 {
            return;
        }
        let mut rings: Vec<(usize, Contour)> = island
            .shells
            .iter()
            .enumerate()
            .flat_map(|(k, region)| region.rings().cloned().map(move |r| (k, r)))
            .filter(|(_, r)| r.len() >= 3)
            .collect();

        while !rings.is_empty() {
            let here = self.position();
            let mut best: Option<(Real, usize, usize)> = None; // cost, ring, start vertex
            for (ri, (inset, ring)) in rings.iter().enumerate() {
                let preference = if self.cfg.outside_first {
                    *inset
                } else {
                    shell_count - 1 - *inset
                };
                let vertex_range = if self.cfg.align_seams { 0..1 } else { 0..ring.len() };
                for vi in vertex_range {
                    let d2 = here.dist2(ring.0[vi]) as Real;
                    let cost = if preference == 0 {
                        d2
                    } else {
                        d2 * 2.0 * (preference + 1) as Real + 10.0
                    };
                    if best.map(|(bc, _, _)| cost < bc).unwrap_or(true) {
                        best = Some((cost, ri, vi));
                    }
                }
            }
            let (_, ri, vi) = best.unwrap();
            let (_, mut ring) = rings.remove(ri);
            ring.0.rotate_left(vi);
            self.print_loop(ring, &island.outlines);
        }
    }

    /// Print one closed path: travel to its start, extrude around, end
    /// where it began. With anchoring, the start of the loop is clipped
    /// by half a width and that much material is pushed extra on the
    /// first stroke, closing the seam without a blob.
    fn print_loop(&mut self, ring: Contour, outlines: &Poly) {
        let perimeter = ring.perimeter_mm();
        let mut path = ring.0;
        path.push(path[0]);

        let mut extra_e = 0.0;
        if self.cfg.anchor && perimeter > 3.0 * self.cfg.extrusion_width {
            let clip = self.cfg.extrusion_width / 2.0;
            let mut remaining = clip;
            let mut i = 0;
            while i + 1 < path.len() {
                let edge = path[i].dist_mm(path[i + 1]);
                if edge > remaining {
                    break;
                }
                remaining -= edge;
                i += 1;
            }
            let start = point_along(path[i], path[i + 1], remaining);
            path.drain(..=i);
            path.insert(0, start);
            extra_e = clip * self.e_per_mm;
        }

        self.travel_to(path[0], outlines);
        let mut first = true;
        for &p in &path[1..] {
            self.extrude_to(p, self.cfg.perimeter_feed_rate, if first { extra_e } else { 0.0 });
            first = false;
        }
    }

    fn plan_infill(&mut self, island: &mut Island) {
        let mut lines = std::mem::take(&mut island.solid_infill);
        lines.append(&mut island.sparse_infill);

        while !lines.is_empty() {
            let here = self.position();
            let mut best = (i128::MAX, 0usize, false);
            for (i, seg) in lines.iter().enumerate() {
                let df = here.dist2(seg.from);
                if df < best.0 {
                    best = (df, i, false);
                }
                let dt = here.dist2(seg.to);
                if dt < best.0 {
                    best = (dt, i, true);
                }
            }
            let seg = lines.remove(best.1);
            let seg = if best.2 { seg.reversed() } else { seg };
            self.travel_to(seg.from, &island.outlines);
            self.extrude_to(seg.to, self.cfg.infill_feed_rate, 0.0);
        }
    }

    fn travel_to(&mut self, p: Point, outlines: &Poly) {
        let (px, py) = (p.x_mm(), p.y_mm());
        let len = ((px - self.x).powi(2) + (py - self.y).powi(2)).sqrt();
        if len <= EPSILON {
            self.new_island = false;
            return;
        }

        if !self.retracted && self.cfg.retract_len > 0.0 {
            let needed = self.new_island
                || len > self.cfg.retract_threshold
                || (self.cfg.retract_within_island && len > self.cfg.retract_min_travel)
                || crosses_outlines(outlines, self.position(), p);
            if needed {
                self.retract();
            }
        }

        self.push(GMove {
            x: px,
            y: py,
            z: self.z,
            de: 0.0,
            feed: self.cfg.travel_feed_rate,
            scalable: false,
        });
        self.x = px;
        self.y = py;
        self.new_island = false;
    }

    fn extrude_to(&mut self, p: Point, feed: Real, extra_e: Real) {
        if self.retracted {
            self.restart();
        }
        let (px, py) = (p.x_mm(), p.y_mm());
        let len = ((px - self.x).powi(2) + (py - self.y).powi(2)).sqrt();
        self.push(GMove {
            x: px,
            y: py,
            z: self.z,
            de: len * self.e_per_mm + extra_e,
            feed,
            scalable: true,
        });
        self.x = px;
        self.y = py;
    }

    fn retract(&mut self) {
        if self.cfg.retract_len > 0.0 {
            self.push(GMove {
                x: self.x,
                y: self.y,
                z: self.z,
                de: -self.cfg.retract_len,
                feed: self.cfg.retract_speed,
                scalable: false,
            });
        }
        self.retracted = true;
    }

    fn restart(&mut self) {
        if self.cfg.retract_len > 0.0 {
            self.push(GMove {
                x: self.x,
                y: self.y,
                z: self.z,
                de: self.cfg.retract_len,
                feed: self.cfg.restart_speed_eff(),
                scalable: false,
            });
        }
        self.retracted = false;
    }

    fn finish_layer(&mut self) {
        if !self.retracted {
            self.retract();
        }
    }

    fn push(&mut self, mv: GMove) {
        let len = ((mv.x - self.x).powi(2) + (mv.y - self.y).powi(2)).sqrt();
        self.time += len / mv.feed;
        self.moves.push(mv);
    }
}

/// Does the travel `from → to` cross any outline edge of the island?
/// Walks every edge with the robust CCW predicate, first hit wins.
fn crosses_outlines(outlines: &Poly, from: Point, to: Point) -> bool {
    for ring in outlines.rings() {
        let n = ring.len();
        for i in 0..n {
            let a = ring.0[i];
            let b = ring.0[(i + 1) % n];
            if segments_cross(from, to, a, b) {
                return true;
            }
        }
    }
    false
}
