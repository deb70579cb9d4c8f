//! Stage 2: assemble each layer's unordered segment soup into closed
//! contours.
//!
//! Matching is exact first (fixed-point endpoints hash, so a clean
//! mesh stitches entirely through a hash multimap) and falls back to a
//! nearest-endpoint scan within the configured tolerance. A gap larger
//! than the tolerance is a hole in the mesh: it is reported, the
//! partial contour is kept, and stitching moves on.

use hashbrown::HashMap;
use log::warn;

use crate::config::Config;
use crate::float_types::to_units;
use crate::geom::{Contour, Point, Segment};

pub fn stitch_layer(segments: Vec<Segment>, layer_index: usize, cfg: &Config) -> Vec<Contour> {
    let tol2 = cfg.tolerance2_units();
    let coarseness = to_units(cfg.coarseness);
    let n = segments.len();
    let mut used = vec![false; n];

    // exact-endpoint multimap over both ends of every segment
    let mut by_endpoint: HashMap<Point, Vec<usize>> = HashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        by_endpoint.entry(seg.from).or_default().push(i);
        by_endpoint.entry(seg.to).or_default().push(i);
    }

    let mut contours = Vec::new();

    for seed in 0..n {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let mut points = vec![segments[seed].from, segments[seed].to];
        let mut accepted = 1usize;
        let mut flipped = 0usize;

        loop {
            let tail = *points.last().unwrap();
            let origin = points[0];

            // an exact match back to the origin closes the contour
            if points.len() >= 3 && tail == origin {
                points.pop();
                break;
            }

            // exact continuation
            let exact = by_endpoint.get(&tail).and_then(|candidates| {
                candidates.iter().copied().find_map(|i| {
                    if used[i] {
                        None
                    } else if segments[i].from == tail {
                        Some((i, false))
                    } else if segments[i].to == tail {
                        Some((i, true))
                    } else {
                        None
                    }
                })
            });
            if let Some((i, flip)) = exact {
                used[i] = true;
                accepted += 1;
                flipped += flip as usize;
                points.push(if flip { segments[i].from } else { segments[i].to });
                continue;
            }

            // nearest endpoint among the remaining segments
            let mut best: Option<(i128, usize, bool)> = None;
            for (i, seg) in segments.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let d_head = tail.dist2(seg.from);
                let d_tail = tail.dist2(seg.to);
                let (d, flip) = if d_head <= d_tail {
                    (d_head, false)
                } else {
                    (d_tail, true)
                };
                if best.map(|(bd, _, _)| d < bd).unwrap_or(true) {
                    best = Some((d, i, flip));
                }
            }
            let d_best = best.map(|(d, _, _)| d).unwrap_or(i128::MAX);

            // prefer closing over consuming a worse match
            let d_close = tail.dist2(origin);
            if points.len() >= 3 && d_close <= tol2 && d_close < d_best {
                break;
            }

            if let Some((d, i, flip)) = best {
                if d <= tol2 {
                    used[i] = true;
                    accepted += 1;
                    flipped += flip as usize;
                    points.push(if flip { segments[i].from } else { segments[i].to });
                    continue;
                }
            }

            warn!("hole in mesh at layer {layer_index}");
            break;
        }

        let mut contour = Contour(points);

        // a flip majority means the source triangles were wound
        // backwards for this contour; reverse to restore orientation
        if flipped * 2 > accepted {
            warn!("flipped segments dominate an outline on layer {layer_index}, reversing");
            contour.reverse();
        }

        let contour = contour.simplified(coarseness);
        if contour.len() >= 3 && contour.signed_area2() != 0 {
            contours.push(contour);
        }
    }

    contours
}
