//! Seam between the fixed-point contour types and the floating-point
//! clipping/offsetting kernel (`geo` booleans, `geo-buf` buffering).
//!
//! Coordinates cross the seam as micron-valued `f64`s, which is exact:
//! every stored unit is a whole number far below 2^52. Results are
//! rounded back onto the unit grid, so a boolean or offset result is at
//! most half a micron away from the kernel's answer.

use geo::orient::Direction;
use geo::{
    BooleanOps, Coord, CoordsIter, LineString, MultiLineString, MultiPolygon, Orient,
    Polygon as GeoPolygon,
};
use geo_buf::{buffer_multi_polygon, buffer_multi_polygon_rounded};

use super::{Contour, Point, Poly, Region, Segment};
use crate::float_types::{Real, SCALE, Unit};

fn ring_to_linestring(ring: &Contour) -> LineString<Real> {
    ring.0
        .iter()
        .map(|p| Coord {
            x: p.x as Real,
            y: p.y as Real,
        })
        .collect()
}

fn linestring_to_ring(ls: &LineString<Real>) -> Contour {
    let mut pts: Vec<Point> = ls
        .coords_iter()
        .map(|c| Point::new(c.x.round() as Unit, c.y.round() as Unit))
        .collect();
    // geo rings repeat the first coordinate at the end; our closure is implicit
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts.dedup();
    Contour(pts)
}

/// Fixed-point region to a kernel multipolygon, unit-valued.
pub fn to_multipolygon(region: &Region) -> MultiPolygon<Real> {
    let polys = region
        .0
        .iter()
        .filter(|p| p.outer.len() >= 3)
        .map(|p| {
            GeoPolygon::new(
                ring_to_linestring(&p.outer),
                p.holes
                    .iter()
                    .filter(|h| h.len() >= 3)
                    .map(ring_to_linestring)
                    .collect(),
            )
        })
        .collect();
    MultiPolygon(polys)
}

/// Kernel multipolygon back onto the unit grid. Exteriors come out
/// counter-clockwise and holes clockwise; degenerate rings are dropped.
pub fn from_multipolygon(mp: &MultiPolygon<Real>) -> Region {
    let oriented = mp.clone().orient(Direction::Default);
    let mut out = Vec::new();
    for poly in &oriented.0 {
        let outer = linestring_to_ring(poly.exterior());
        if outer.len() < 3 || outer.signed_area2() == 0 {
            continue;
        }
        let holes = poly
            .interiors()
            .iter()
            .map(linestring_to_ring)
            .filter(|h| h.len() >= 3 && h.signed_area2() != 0)
            .collect();
        out.push(Poly { outer, holes });
    }
    Region(out)
}

pub fn union(a: &Region, b: &Region) -> Region {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    from_multipolygon(&to_multipolygon(a).union(&to_multipolygon(b)))
}

pub fn difference(a: &Region, b: &Region) -> Region {
    if a.is_empty() || b.is_empty() {
        return a.clone();
    }
    from_multipolygon(&to_multipolygon(a).difference(&to_multipolygon(b)))
}

pub fn intersection(a: &Region, b: &Region) -> Region {
    if a.is_empty() || b.is_empty() {
        return Region::default();
    }
    from_multipolygon(&to_multipolygon(a).intersection(&to_multipolygon(b)))
}

/// Union a whole batch of regions by folding.
pub fn union_all<I>(regions: I) -> Region
where
    I: IntoIterator<Item = Region>,
{
    let mut acc: Option<MultiPolygon<Real>> = None;
    for region in regions {
        if region.is_empty() {
            continue;
        }
        let mp = to_multipolygon(&region);
        acc = Some(match acc {
            None => mp,
            Some(prev) => prev.union(&mp),
        });
    }
    match acc {
        None => Region::default(),
        Some(mp) => from_multipolygon(&mp),
    }
}

/// Offset a region by `delta_mm` (positive grows, negative shrinks).
/// `rounded` selects circular-arc joins instead of sharp ones.
pub fn offset_mm(region: &Region, delta_mm: Real, rounded: bool) -> Region {
    if region.is_empty() {
        return Region::default();
    }
    let mp = to_multipolygon(region);
    let delta = delta_mm * SCALE;
    let buffered = if rounded {
        buffer_multi_polygon_rounded(&mp, delta)
    } else {
        buffer_multi_polygon(&mp, delta)
    };
    from_multipolygon(&buffered)
}

/// Shrink then regrow by `amount_mm`, erasing features narrower than
/// twice the amount.
pub fn shrink_regrow(region: &Region, amount_mm: Real, rounded: bool) -> Region {
    if region.is_empty() || amount_mm <= 0.0 {
        return region.clone();
    }
    let shrunk = offset_mm(region, -amount_mm, rounded);
    if shrunk.is_empty() {
        return Region::default();
    }
    offset_mm(&shrunk, amount_mm, rounded)
}

/// Clip open segments against a region, keeping the inside parts.
/// Clipped endpoints are rounded onto the unit grid.
pub fn clip_segments(region: &Region, segments: &[Segment]) -> Vec<Segment> {
    if region.is_empty() || segments.is_empty() {
        return Vec::new();
    }
    let lines: MultiLineString<Real> = MultiLineString(
        segments
            .iter()
            .map(|s| {
                LineString(vec![
                    Coord {
                        x: s.from.x as Real,
                        y: s.from.y as Real,
                    },
                    Coord {
                        x: s.to.x as Real,
                        y: s.to.y as Real,
                    },
                ])
            })
            .collect(),
    );
    let clipped = to_multipolygon(region).clip(&lines, false);
    let mut out = Vec::new();
    for ls in &clipped.0 {
        let pts: Vec<Point> = ls
            .coords_iter()
            .map(|c| Point::new(c.x.round() as Unit, c.y.round() as Unit))
            .collect();
        for pair in pts.windows(2) {
            if pair[0] != pair[1] {
                out.push(Segment::new(pair[0], pair[1]));
            }
        }
    }
    out
}
