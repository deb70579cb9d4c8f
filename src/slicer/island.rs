//! Stage 3: organize a layer's closed contours into islands.
//!
//! Ring nesting is recovered by integer containment tests: a ring's
//! depth is the number of other rings strictly containing it. Even
//! depth means an outer boundary, odd depth a hole of the enclosing
//! outer; an even ring inside a hole starts a new island. Each
//! outer-with-holes candidate is then passed through a fold union in
//! the boolean kernel, which merges overlapping outers and heals
//! self-intersections.

use crate::geom::clip;
use crate::geom::{Contour, Poly, Region};

use super::Island;

pub fn build_islands(contours: Vec<Contour>) -> Vec<Island> {
    // normalize: non-degenerate rings, counter-clockwise
    let mut rings: Vec<Contour> = Vec::with_capacity(contours.len());
    for mut c in contours {
        if c.len() < 3 || c.signed_area2() == 0 {
            continue;
        }
        if !c.is_ccw() {
            c.reverse();
        }
        rings.push(c);
    }
    if rings.is_empty() {
        return Vec::new();
    }

    // Nesting depth by strict containment of a representative vertex.
    // A ring can only be nested in a strictly larger one; that guard
    // keeps overlapping same-level rings (non-manifold junk) at equal
    // depth so the union below merges them instead of hole-punching.
    let n = rings.len();
    let bounds: Vec<_> = rings.iter().map(|r| r.bounds()).collect();
    let areas: Vec<i128> = rings.iter().map(|r| r.signed_area2().abs()).collect();
    let depth: Vec<usize> = (0..n)
        .map(|i| {
            let probe = rings[i].0[0];
            (0..n)
                .filter(|&j| {
                    j != i
                        && areas[j] > areas[i]
                        && bounds[j].contains(probe)
                        && rings[j].contains(probe)
                })
                .count()
        })
        .collect();

    // attach each odd ring to its direct even parent
    let mut candidates: Vec<Region> = Vec::new();
    for i in 0..n {
        if depth[i] % 2 != 0 {
            continue;
        }
        let holes: Vec<Contour> = (0..n)
            .filter(|&j| {
                depth[j] == depth[i] + 1
                    && bounds[i].contains(rings[j].0[0])
                    && rings[i].contains(rings[j].0[0])
            })
            .map(|j| {
                let mut hole = rings[j].clone();
                hole.reverse(); // holes wind clockwise
                hole
            })
            .collect();
        candidates.push(Region::from_poly(Poly {
            outer: rings[i].clone(),
            holes,
        }));
    }

    // heal overlaps and self-intersections; each surviving polygon of
    // the union is one island
    let healed = clip::union_all(candidates);
    healed.0.into_iter().map(Island::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;

    fn ring(x0: i64, y0: i64, side: i64, ccw: bool) -> Contour {
        let mut c = Contour(vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ]);
        if !ccw {
            c.reverse();
        }
        c
    }

    #[test]
    fn two_disjoint_rings_make_two_islands() {
        let islands = build_islands(vec![ring(0, 0, 1000, true), ring(5000, 0, 1000, true)]);
        assert_eq!(islands.len(), 2);
        assert!(islands.iter().all(|i| i.outlines.holes.is_empty()));
    }

    #[test]
    fn nested_ring_becomes_hole() {
        let islands = build_islands(vec![ring(0, 0, 10_000, true), ring(2_000, 2_000, 6_000, true)]);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].outlines.holes.len(), 1);
        assert!(islands[0].outlines.outer.is_ccw());
        assert!(!islands[0].outlines.holes[0].is_ccw());
    }

    #[test]
    fn ring_orientation_from_stitcher_is_irrelevant() {
        // a clockwise inner ring (as a correctly-wound hole arrives)
        // and a clockwise outer both normalize the same way
        let islands = build_islands(vec![ring(0, 0, 10_000, false), ring(2_000, 2_000, 6_000, false)]);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].outlines.holes.len(), 1);
    }

    #[test]
    fn island_inside_hole_starts_new_island() {
        let islands = build_islands(vec![
            ring(0, 0, 10_000, true),
            ring(1_000, 1_000, 8_000, true),
            ring(3_000, 3_000, 4_000, true),
        ]);
        assert_eq!(islands.len(), 2);
        let with_hole = islands
            .iter()
            .find(|i| !i.outlines.holes.is_empty())
            .expect("outer island keeps its hole");
        assert_eq!(with_hole.outlines.holes.len(), 1);
        let nested = islands
            .iter()
            .find(|i| i.outlines.holes.is_empty())
            .expect("nested island exists");
        assert!(nested.outlines.outer.signed_area2() < with_hole.outlines.outer.signed_area2());
    }

    #[test]
    fn overlapping_outers_merge() {
        let islands = build_islands(vec![ring(0, 0, 10_000, true), ring(5_000, 0, 10_000, true)]);
        assert_eq!(islands.len(), 1);
        let area2 = islands[0].outlines.outer.signed_area2();
        // 15 x 10 mm merged rectangle
        assert_eq!(area2, 2 * 15_000 * 10_000);
    }

    #[test]
    fn degenerate_input_yields_no_islands() {
        assert!(build_islands(vec![Contour(vec![Point::new(0, 0), Point::new(1, 1)])]).is_empty());
    }
}
