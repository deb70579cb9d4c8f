//! Stage 1: intersect every triangle with the cutting planes it
//! crosses, producing one oriented segment per (triangle, plane) pair.
//!
//! The layer range of a triangle is biased by +0.4999 / +0.5001 so a
//! plane that grazes a vertex exactly is excluded; a graze would
//! produce a zero-length segment that only burdens the stitcher.
//!
//! Triangles are processed in parallel as ordered chunks; each chunk
//! collects `(layer, segment)` pairs locally and the chunks are merged
//! in order at the barrier. This preserves the per-layer-buffer
//! contract without locks and keeps segment order deterministic.

use rayon::prelude::*;

use crate::config::Config;
use crate::float_types::Real;
use crate::geom::{Point, Segment};
use crate::mesh::{Triangle, TriangleMesh};

use super::Layer;

const CHUNK: usize = 512;

pub fn extract(mesh: &TriangleMesh, cfg: &Config, layers: &mut [Layer]) {
    let n = layers.len();
    let chunks: Vec<Vec<(usize, Segment)>> = mesh
        .triangles
        .par_chunks(CHUNK)
        .map(|chunk| {
            let mut out = Vec::new();
            for tri in chunk {
                slice_triangle(tri, cfg.layer_height, n, &mut out);
            }
            out
        })
        .collect();
    for chunk in chunks {
        for (layer, seg) in chunk {
            layers[layer].segments.push(seg);
        }
    }
}

fn slice_triangle(
    tri: &Triangle,
    layer_height: Real,
    layer_total: usize,
    out: &mut Vec<(usize, Segment)>,
) {
    // geometry below the build plate is cropped
    let z_min = tri
        .vertices
        .iter()
        .map(|v| v.z)
        .fold(Real::MAX, Real::min)
        .max(0.0);
    let z_max = tri
        .vertices
        .iter()
        .map(|v| v.z)
        .fold(-Real::MAX, Real::max)
        .max(0.0);

    let lo = ((z_min / layer_height + 0.4999).floor() as i64).max(0);
    let hi = ((z_max / layer_height + 0.5001).floor() as i64).min(layer_total as i64);

    for i in lo..hi {
        let z_cut = i as Real * layer_height + layer_height / 2.0;
        if let Some(seg) = cut_triangle(tri, z_cut) {
            if seg.from != seg.to {
                out.push((i as usize, seg));
            }
        }
    }
}

/// Intersect one triangle with the plane `z = z_cut`.
///
/// Vertices strictly below the plane are "below"; on-plane vertices
/// count as above. With the winding of an outward-facing triangle, the
/// lone vertex on one side fixes the segment direction so the solid
/// interior lies to the left of from→to.
fn cut_triangle(tri: &Triangle, z_cut: Real) -> Option<Segment> {
    let below = [
        tri.vertices[0].z < z_cut,
        tri.vertices[1].z < z_cut,
        tri.vertices[2].z < z_cut,
    ];
    let below_count = below.iter().filter(|&&b| b).count();
    if below_count == 0 || below_count == 3 {
        return None;
    }

    // rotate so the lone vertex comes first, keeping winding
    let lone_is_below = below_count == 1;
    let lone = (0..3).find(|&i| below[i] == lone_is_below)?;
    let a = tri.vertices[lone];
    let b = tri.vertices[(lone + 1) % 3];
    let c = tri.vertices[(lone + 2) % 3];

    let on_ab = edge_plane_intersection(&a, &b, z_cut);
    let on_ca = edge_plane_intersection(&c, &a, z_cut);

    Some(if lone_is_below {
        Segment::new(on_ca, on_ab)
    } else {
        Segment::new(on_ab, on_ca)
    })
}

fn edge_plane_intersection(
    u: &nalgebra::Point3<Real>,
    w: &nalgebra::Point3<Real>,
    z_cut: Real,
) -> Point {
    let t = (z_cut - u.z) / (w.z - u.z);
    Point::from_mm(u.x + t * (w.x - u.x), u.y + t * (w.y - u.y))
}
