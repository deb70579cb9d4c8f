//! Stage 4: concentric shells, the infill boundary, and shell gaps.
//!
//! The outermost perimeter is placed `edge_width / 2` inside the
//! outline. Edge width, not extrusion width: the outer bead has one
//! unconstrained, rounded flank, so the same cross-sectional area
//! spreads slightly wider. Every deeper shell steps inward by one
//! extrusion width.

use crate::config::Config;
use crate::geom::clip;
use crate::geom::Region;

use super::{Island, Layer};

pub fn generate(layer: &mut Layer, cfg: &Config) {
    for island in &mut layer.islands {
        generate_island(island, cfg);
    }
}

fn generate_island(island: &mut Island, cfg: &Config) {
    let ew = cfg.extrusion_width;
    let edge = cfg.edge_width();
    let rounded = cfg.round_insets;
    let outline_region = Region::from_poly(island.outlines.clone());

    // shells, stopping as soon as an offset erodes to nothing
    let mut shells: Vec<Region> = Vec::new();
    for k in 0..cfg.shells as usize {
        let next = if k == 0 {
            clip::offset_mm(&outline_region, -edge / 2.0, rounded)
        } else {
            // step inward, then out-and-back by half a width: a direct
            // offset of a thin feature can fold over itself, and the
            // extra pass erases the overlap
            let stepped = clip::offset_mm(&shells[k - 1], -ew, rounded);
            if stepped.is_empty() {
                stepped
            } else {
                clip::offset_mm(&clip::offset_mm(&stepped, ew / 2.0, rounded), -ew / 2.0, rounded)
            }
        };
        if next.is_empty() {
            break;
        }
        shells.push(next);
    }

    // the fill region sits half a bead inside the innermost perimeter
    let infill_boundary = if cfg.shells == 0 {
        clip::offset_mm(&outline_region, -edge / 2.0, rounded)
    } else {
        match shells.last() {
            Some(last) => clip::offset_mm(last, -ew / 2.0, rounded),
            None => Region::default(), // thinner than one perimeter
        }
    };

    // material-thin bands between adjacent shells get solid fill
    let sliver = ew * cfg.fill_threshold / 2.0;
    let mut shell_gaps: Vec<Region> = Vec::new();
    for pair in shells.windows(2) {
        let band = clip::difference(&pair[0], &pair[1]);
        let mut gap = clip::offset_mm(&band, -ew / 2.0, rounded);
        if cfg.fill_threshold > 0.0 && !gap.is_empty() {
            gap = clip::shrink_regrow(&gap, sliver, rounded);
        }
        shell_gaps.push(gap);
    }

    if cfg.align_seams {
        for shell in &mut shells {
            for ring in shell.rings_mut() {
                ring.align_seam();
            }
        }
    }

    island.shells = shells;
    island.infill_boundary = infill_boundary;
    island.shell_gaps = shell_gaps;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Contour, Point, Poly};

    fn island_square(side_mm: f64) -> Island {
        let s = (side_mm * 1000.0) as i64;
        Island::new(Poly {
            outer: Contour(vec![
                Point::new(0, 0),
                Point::new(s, 0),
                Point::new(s, s),
                Point::new(0, s),
            ]),
            holes: Vec::new(),
        })
    }

    fn island_annulus(outer_mm: f64, wall_mm: f64) -> Island {
        let o = (outer_mm * 1000.0) as i64;
        let w = (wall_mm * 1000.0) as i64;
        let mut hole = Contour(vec![
            Point::new(w, w),
            Point::new(o - w, w),
            Point::new(o - w, o - w),
            Point::new(w, o - w),
        ]);
        hole.reverse();
        Island::new(Poly {
            outer: Contour(vec![
                Point::new(0, 0),
                Point::new(o, 0),
                Point::new(o, o),
                Point::new(0, o),
            ]),
            holes: vec![hole],
        })
    }

    #[test]
    fn shells_nest_inward() {
        let mut island = island_square(20.0);
        let cfg = Config::default(); // 2 shells
        generate_island(&mut island, &cfg);
        assert_eq!(island.shells.len(), 2);
        assert!(!island.infill_boundary.is_empty());
        let a0: i128 = island.shells[0].rings().map(|r| r.signed_area2()).sum();
        let a1: i128 = island.shells[1].rings().map(|r| r.signed_area2()).sum();
        assert!(a1 < a0, "inner shell must be smaller");
    }

    #[test]
    fn hollow_wall_shells_have_two_loops_each() {
        // 20 mm box with a 2 mm wall: each shell is an annulus with an
        // outer and an inner loop
        let mut island = island_annulus(20.0, 2.0);
        let cfg = Config::default();
        generate_island(&mut island, &cfg);
        assert_eq!(island.shells.len(), 2);
        for shell in &island.shells {
            assert_eq!(shell.rings().count(), 2);
        }
        assert!(!island.infill_boundary.is_empty());
        assert_eq!(island.shell_gaps.len(), 1);
    }

    #[test]
    fn thin_feature_stops_shell_production() {
        // 0.5 mm wide strip: shell 0 fits nowhere after a ~0.2 mm inset
        // on both sides, deeper shells certainly don't
        let mut island = island_square(0.5);
        let cfg = Config::default();
        generate_island(&mut island, &cfg);
        assert!(island.shells.len() <= 1);
        if island.shells.is_empty() {
            assert!(island.infill_boundary.is_empty());
        }
    }

    #[test]
    fn zero_shells_leaves_fill_up_to_the_edge() {
        let mut island = island_square(10.0);
        let mut cfg = Config::default();
        cfg.shells = 0;
        generate_island(&mut island, &cfg);
        assert!(island.shells.is_empty());
        assert!(!island.infill_boundary.is_empty());
        // boundary is the outline inset by edge_width / 2
        let b = island.infill_boundary.bounds();
        let inset = (cfg.edge_width() / 2.0 * 1000.0) as i64;
        assert!((b.min.x - inset).abs() <= 2);
        assert!((b.min.y - inset).abs() <= 2);
    }

    #[test]
    fn seam_alignment_rotates_rings() {
        let mut island = island_square(10.0);
        let cfg = Config::default();
        generate_island(&mut island, &cfg);
        for shell in &island.shells {
            for ring in shell.rings() {
                let first = ring.0[0];
                assert!(ring
                    .0
                    .iter()
                    .all(|p| (first.x + first.y, first.x, first.y) <= (p.x + p.y, p.x, p.y)));
            }
        }
    }
}
