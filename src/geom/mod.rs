//! Fixed-point planar geometry used throughout the slicing pipeline.
//!
//! All stored contour coordinates are signed integers in microns
//! (millimetres × [`SCALE`](crate::float_types::SCALE)). Exact integer
//! comparisons make contour stitching deterministic, and the shoelace /
//! point-in-ring predicates below are evaluated in `i128` so they never
//! overflow for any realistic build volume. Floating point appears only
//! at the boundaries: conversion from mesh space and the clipping seam
//! in [`clip`].

use crate::float_types::{Real, SCALE, Unit};

pub mod clip;

/// A 2D point in fixed-point units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: Unit,
    pub y: Unit,
}

impl Point {
    pub const fn new(x: Unit, y: Unit) -> Self {
        Point { x, y }
    }

    /// Build a point from millimetre coordinates, rounding to the grid.
    pub fn from_mm(x: Real, y: Real) -> Self {
        Point {
            x: (x * SCALE).round() as Unit,
            y: (y * SCALE).round() as Unit,
        }
    }

    pub fn x_mm(&self) -> Real {
        self.x as Real / SCALE
    }

    pub fn y_mm(&self) -> Real {
        self.y as Real / SCALE
    }

    /// Squared distance in units², exact.
    pub fn dist2(&self, other: Point) -> i128 {
        let dx = (self.x - other.x) as i128;
        let dy = (self.y - other.y) as i128;
        dx * dx + dy * dy
    }

    /// Euclidean distance in millimetres.
    pub fn dist_mm(&self, other: Point) -> Real {
        ((self.dist2(other) as Real).sqrt()) / SCALE
    }
}

/// An oriented open segment; raw slice output and clipped infill lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

impl Segment {
    pub const fn new(from: Point, to: Point) -> Self {
        Segment { from, to }
    }

    pub fn len_mm(&self) -> Real {
        self.from.dist_mm(self.to)
    }

    pub fn reversed(&self) -> Segment {
        Segment {
            from: self.to,
            to: self.from,
        }
    }
}

/// Axis-aligned bounding box over fixed-point points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::EMPTY
    }
}

impl Bounds {
    /// The empty box; any `expand` replaces it.
    pub const EMPTY: Bounds = Bounds {
        min: Point::new(Unit::MAX, Unit::MAX),
        max: Point::new(Unit::MIN, Unit::MIN),
    };

    pub fn expand(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn merge(&mut self, other: &Bounds) {
        self.min.x = self.min.x.min(other.min.x);
        self.min.y = self.min.y.min(other.min.y);
        self.max.x = self.max.x.max(other.max.x);
        self.max.y = self.max.y.max(other.max.y);
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Grow the box by `margin` units on every side.
    pub fn inflate(&self, margin: Unit) -> Bounds {
        Bounds {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// A closed ring of fixed-point points. Closure is implicit: the edge
/// from the last point back to the first is part of the ring and the
/// first point is not repeated at the end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contour(pub Vec<Point>);

impl Contour {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Twice the signed area in units², exact. Positive for
    /// counter-clockwise rings.
    pub fn signed_area2(&self) -> i128 {
        let n = self.0.len();
        if n < 3 {
            return 0;
        }
        let mut acc: i128 = 0;
        for i in 0..n {
            let a = self.0[i];
            let b = self.0[(i + 1) % n];
            acc += a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128;
        }
        acc
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area2() > 0
    }

    pub fn reverse(&mut self) {
        self.0.reverse();
    }

    /// Total edge length in millimetres, including the closing edge.
    pub fn perimeter_mm(&self) -> Real {
        let n = self.0.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.0[i].dist_mm(self.0[(i + 1) % n]))
            .sum()
    }

    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::EMPTY;
        for &p in &self.0 {
            b.expand(p);
        }
        b
    }

    /// Strict interior test by horizontal ray casting. Points on the
    /// boundary may land on either side; callers use representative
    /// points that are never boundary points of the ring under test.
    pub fn contains(&self, p: Point) -> bool {
        let n = self.0.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.0[j];
            let b = self.0[i];
            if (a.y > p.y) != (b.y > p.y) {
                let dy = (b.y - a.y) as i128;
                let lhs = (p.x - a.x) as i128 * dy;
                let rhs = (b.x - a.x) as i128 * (p.y - a.y) as i128;
                if (dy > 0 && lhs < rhs) || (dy < 0 && lhs > rhs) {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Drop vertices whose perpendicular deviation from the line through
    /// their kept neighbours is below `tol` units. One light pass; the
    /// boolean kernel cleans up anything structural.
    pub fn simplified(&self, tol: Unit) -> Contour {
        let n = self.0.len();
        if n < 4 || tol <= 0 {
            return self.clone();
        }
        let tol2 = tol as i128 * tol as i128;
        let mut out: Vec<Point> = Vec::with_capacity(n);
        for i in 0..n {
            let prev = *out.last().unwrap_or(&self.0[n - 1]);
            let cur = self.0[i];
            let next = self.0[(i + 1) % n];
            let bx = (next.x - prev.x) as i128;
            let by = (next.y - prev.y) as i128;
            let cross = (cur.x - prev.x) as i128 * by - (cur.y - prev.y) as i128 * bx;
            let base2 = bx * bx + by * by;
            // deviation² = cross² / base²; compare without dividing
            if base2 != 0 && cross * cross <= tol2 * base2 {
                continue;
            }
            out.push(cur);
        }
        if out.len() < 3 { self.clone() } else { Contour(out) }
    }

    /// Rotate the ring so its first vertex is the one minimizing x + y,
    /// ties broken lexicographically. Aligns seams vertically across
    /// layers.
    pub fn align_seam(&mut self) {
        if self.0.len() < 2 {
            return;
        }
        let best = self
            .0
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| (p.x + p.y, p.x, p.y))
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.0.rotate_left(best);
    }
}

/// One positive outer ring with its immediate holes; the fixed-point
/// mirror of a `geo` polygon.
#[derive(Debug, Clone, Default)]
pub struct Poly {
    pub outer: Contour,
    pub holes: Vec<Contour>,
}

impl Poly {
    pub fn rings(&self) -> impl Iterator<Item = &Contour> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    pub fn rings_mut(&mut self) -> impl Iterator<Item = &mut Contour> {
        std::iter::once(&mut self.outer).chain(self.holes.iter_mut())
    }

    pub fn bounds(&self) -> Bounds {
        self.outer.bounds()
    }
}

/// A set of disjoint [`Poly`]s; the fixed-point mirror of a
/// `geo::MultiPolygon`.
#[derive(Debug, Clone, Default)]
pub struct Region(pub Vec<Poly>);

impl Region {
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|p| p.outer.len() < 3)
    }

    pub fn rings(&self) -> impl Iterator<Item = &Contour> {
        self.0.iter().flat_map(|p| p.rings())
    }

    pub fn rings_mut(&mut self) -> impl Iterator<Item = &mut Contour> {
        self.0.iter_mut().flat_map(|p| p.rings_mut())
    }

    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::EMPTY;
        for p in &self.0 {
            b.merge(&p.bounds());
        }
        b
    }

    pub fn from_poly(poly: Poly) -> Region {
        Region(vec![poly])
    }
}

/// True when segments `c→d` and `a→b` properly cross, evaluated with
/// the adaptive-precision CCW predicate. Shared endpoints and mere
/// touching do not count as a crossing.
pub fn segments_cross(c: Point, d: Point, a: Point, b: Point) -> bool {
    #[inline]
    fn orient(p: Point, q: Point, r: Point) -> Real {
        robust::orient2d(
            robust::Coord {
                x: p.x as Real,
                y: p.y as Real,
            },
            robust::Coord {
                x: q.x as Real,
                y: q.y as Real,
            },
            robust::Coord {
                x: r.x as Real,
                y: r.y as Real,
            },
        )
    }
    let d1 = orient(a, b, c);
    let d2 = orient(a, b, d);
    let d3 = orient(c, d, a);
    let d4 = orient(c, d, b);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// The point `dist_mm` along the way from `a` to `b`.
pub fn point_along(a: Point, b: Point, dist_mm: Real) -> Point {
    let len = a.dist_mm(b);
    if len <= 0.0 {
        return a;
    }
    let t = (dist_mm / len).clamp(0.0, 1.0);
    Point {
        x: a.x + ((b.x - a.x) as Real * t).round() as Unit,
        y: a.y + ((b.y - a.y) as Real * t).round() as Unit,
    }
}
