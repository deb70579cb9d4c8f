use nalgebra::Point3;

use crate::config::Config;
use crate::float_types::{Real, to_units};
use crate::gcode;
use crate::mesh::{Triangle, TriangleMesh};
use crate::slicer::{self, SlicedModel};

// --------------------------------------------------------
//   Helpers
// --------------------------------------------------------

fn tri(a: [Real; 3], b: [Real; 3], c: [Real; 3]) -> Triangle {
    Triangle {
        vertices: [
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
        ],
    }
}

/// Closed cube [0, l]³ with outward-facing winding.
fn cube_mesh(l: Real) -> TriangleMesh {
    let triangles = vec![
        // bottom (-z)
        tri([0., 0., 0.], [0., l, 0.], [l, l, 0.]),
        tri([0., 0., 0.], [l, l, 0.], [l, 0., 0.]),
        // top (+z)
        tri([0., 0., l], [l, 0., l], [l, l, l]),
        tri([0., 0., l], [l, l, l], [0., l, l]),
        // front (-y)
        tri([0., 0., 0.], [l, 0., 0.], [l, 0., l]),
        tri([0., 0., 0.], [l, 0., l], [0., 0., l]),
        // back (+y)
        tri([0., l, 0.], [0., l, l], [l, l, l]),
        tri([0., l, 0.], [l, l, l], [l, l, 0.]),
        // left (-x)
        tri([0., 0., 0.], [0., 0., l], [0., l, l]),
        tri([0., 0., 0.], [0., l, l], [0., l, 0.]),
        // right (+x)
        tri([l, 0., 0.], [l, l, 0.], [l, l, l]),
        tri([l, 0., 0.], [l, l, l], [l, 0., l]),
    ];
    TriangleMesh::from_triangles(triangles)
}

/// One vertical wall from `a` to `b`, solid on the left of a→b.
fn wall(a: [Real; 2], b: [Real; 2], h: Real, out: &mut Vec<Triangle>) {
    let a0 = [a[0], a[1], 0.0];
    let b0 = [b[0], b[1], 0.0];
    let b1 = [b[0], b[1], h];
    let a1 = [a[0], a[1], h];
    out.push(tri(a0, b0, b1));
    out.push(tri(a0, b1, a1));
}

/// Open-ended square tube: outer side `o`, wall thickness `w`,
/// height `h`. Every slice is one ring-shaped island.
fn tube_mesh(o: Real, w: Real, h: Real) -> TriangleMesh {
    let mut triangles = Vec::new();
    // outer ring, counter-clockwise
    let oc = [[0.0, 0.0], [o, 0.0], [o, o], [0.0, o]];
    for i in 0..4 {
        wall(oc[i], oc[(i + 1) % 4], h, &mut triangles);
    }
    // inner ring, clockwise, so the solid stays between the rings
    let ic = [[w, w], [w, o - w], [o - w, o - w], [o - w, w]];
    for i in 0..4 {
        wall(ic[i], ic[(i + 1) % 4], h, &mut triangles);
    }
    TriangleMesh::from_triangles(triangles)
}

/// Tetrahedron over the origin; `flip_one_face` inverts the winding of
/// the y=0 face to simulate bad source normals.
fn tetrahedron_mesh(flip_one_face: bool) -> TriangleMesh {
    let a = [0.0, 0.0, 0.0];
    let b = [10.0, 0.0, 0.0];
    let c = [0.0, 10.0, 0.0];
    let d = [0.0, 0.0, 10.0];
    let mut triangles = vec![
        tri(a, c, b), // base, -z
        tri(a, d, c), // x = 0 face, -x
        tri(b, c, d), // slanted face
    ];
    triangles.push(if flip_one_face {
        tri(a, d, b) // wound backwards
    } else {
        tri(a, b, d) // y = 0 face, -y
    });
    TriangleMesh::from_triangles(triangles)
}

fn emit_string(model: &mut SlicedModel, cfg: &Config) -> (String, gcode::emit::Totals) {
    let mut buf = Vec::new();
    let totals = gcode::emit::write_gcode(model, cfg, &mut buf).unwrap();
    (String::from_utf8(buf).unwrap(), totals)
}

fn slice_and_plan(mesh: TriangleMesh, cfg: &Config) -> SlicedModel {
    let mut model = slicer::slice(mesh, cfg);
    gcode::plan(&mut model, cfg);
    model
}

// --------------------------------------------------------
//   Layer counting
// --------------------------------------------------------

#[test]
fn layer_count_is_ceiling_of_height() {
    assert_eq!(slicer::layer_count(10.0, 0.2), 50);
    assert_eq!(slicer::layer_count(10.0, 0.3), 34);
    assert_eq!(slicer::layer_count(0.0, 0.2), 0);
    assert_eq!(slicer::layer_count(-1.0, 0.2), 0);
}

#[test]
fn flat_mesh_produces_zero_layers() {
    // a disk one triangle thick at z = 0 has no printable height
    let mesh = TriangleMesh::from_triangles(vec![tri(
        [0.0, 0.0, 0.0],
        [10.0, 0.0, 0.0],
        [0.0, 10.0, 0.0],
    )]);
    let model = slicer::slice(mesh, &Config::default());
    assert!(model.layers.is_empty());
}

// --------------------------------------------------------
//   Cube end to end
// --------------------------------------------------------

#[test]
fn cube_slices_into_square_islands() {
    let cfg = Config::default();
    let model = slicer::slice(cube_mesh(10.0), &cfg);
    assert_eq!(model.layers.len(), 50);
    for layer in &model.layers {
        assert_eq!(layer.islands.len(), 1, "layer {}", layer.index);
        let island = &layer.islands[0];
        assert!(island.outlines.holes.is_empty());
        assert!(island.outlines.outer.is_ccw());
        let area_mm2 = island.outlines.outer.signed_area2() as Real / 2.0 / 1e6;
        assert!((area_mm2 - 100.0).abs() < 0.1, "area {area_mm2}");
    }
}

#[test]
fn cube_outline_vertices_stay_in_the_expanded_bounding_box() {
    let cfg = Config::default();
    let model = slicer::slice(cube_mesh(10.0), &cfg);
    let roomy = model
        .xy_bounds
        .inflate(to_units(cfg.edge_width() / 2.0) + 2);
    for layer in &model.layers {
        for island in &layer.islands {
            for ring in island.outlines.rings() {
                for &p in &ring.0 {
                    assert!(roomy.contains(p), "{p:?} outside {roomy:?}");
                }
            }
        }
    }
}

#[test]
fn cube_round_trip_extrusion_total() {
    // solid 10 mm cube: the emitted feedstock length approximates
    // volume / feedstock cross-section, short of the perimeter band
    let mut cfg = Config::default();
    cfg.shells = 0;
    cfg.infill_density = 1.0;
    cfg.packing_density = 1.0;
    cfg.retract_len = 0.0;
    let mut model = slice_and_plan(cube_mesh(10.0), &cfg);
    let (_, totals) = emit_string(&mut model, &cfg);

    let expected = 10.0 * 10.0 * 10.0 * cfg.flow_multiplier / cfg.material_area();
    let ratio = totals.material_mm / expected;
    assert!(
        (0.80..=1.02).contains(&ratio),
        "material {:.1} mm vs ideal {:.1} mm (ratio {:.3})",
        totals.material_mm,
        expected,
        ratio
    );
}

#[test]
fn emitted_delta_e_sums_to_reported_material() {
    let cfg = Config::default();
    let mut model = slice_and_plan(cube_mesh(5.0), &cfg);
    let planned_net: Real = model
        .layers
        .iter()
        .flat_map(|l| l.moves.iter())
        .map(|m| m.de)
        .sum();
    let (text, totals) = emit_string(&mut model, &cfg);
    assert!((planned_net - totals.material_mm).abs() < 1e-6);
    assert!(text.contains("; material length ="));
    assert!(text.contains("; material mass ="));
    assert!(text.contains("; material cost ="));
}

#[test]
fn every_layer_is_announced_in_order() {
    let cfg = Config::default();
    let mut model = slice_and_plan(cube_mesh(2.0), &cfg);
    let (text, _) = emit_string(&mut model, &cfg);
    let mut last = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("; layer ") {
            let idx: usize = rest.split_whitespace().next().unwrap().parse().unwrap();
            if let Some(prev) = last {
                assert_eq!(idx, prev + 1);
            }
            last = Some(idx);
        }
    }
    assert_eq!(last, Some(9));
}

#[test]
fn identical_runs_produce_identical_gcode() {
    let cfg = Config::default();
    let mut a = slice_and_plan(cube_mesh(6.0), &cfg);
    let mut b = slice_and_plan(cube_mesh(6.0), &cfg);
    let (ta, _) = emit_string(&mut a, &cfg);
    let (tb, _) = emit_string(&mut b, &cfg);
    assert_eq!(ta, tb);
}

// --------------------------------------------------------
//   Hollow tube (walls, gaps, fill placement)
// --------------------------------------------------------

#[test]
fn tube_layers_are_rings_with_two_loop_shells() {
    let mut cfg = Config::default();
    cfg.shells = 2;
    cfg.extrusion_width = 0.4;
    cfg.infill_density = 0.0;
    let model = slicer::slice(tube_mesh(20.0, 2.0, 20.0), &cfg);
    assert_eq!(model.layers.len(), 100);

    for layer in &model.layers {
        assert_eq!(layer.islands.len(), 1, "layer {}", layer.index);
        let island = &layer.islands[0];
        assert_eq!(island.outlines.holes.len(), 1, "layer {}", layer.index);
        assert_eq!(island.shells.len(), 2);
        for shell in &island.shells {
            assert_eq!(shell.rings().count(), 2, "layer {}", layer.index);
        }
        assert!(!island.infill_boundary.is_empty());
    }
}

#[test]
fn tube_solid_fill_only_on_floor_and_roof_layers() {
    let mut cfg = Config::default();
    cfg.shells = 2;
    cfg.infill_density = 0.0; // 4 floor and 4 roof layers at 0.8 mm
    let model = slicer::slice(tube_mesh(20.0, 2.0, 20.0), &cfg);
    let n = model.layers.len();
    for layer in &model.layers {
        let island = &layer.islands[0];
        let skin = layer.index < 4 || layer.index + 4 >= n;
        assert_eq!(
            !island.solid_infill.is_empty(),
            skin,
            "layer {} of {}",
            layer.index,
            n
        );
        assert!(island.sparse_infill.is_empty());
    }
}

// --------------------------------------------------------
//   Mesh pathologies
// --------------------------------------------------------

#[test]
fn flipped_face_still_slices_closed() {
    let cfg = Config::default();
    let good = slicer::slice(tetrahedron_mesh(false), &cfg);
    let bad = slicer::slice(tetrahedron_mesh(true), &cfg);
    assert_eq!(good.layers.len(), bad.layers.len());
    for (g, b) in good.layers.iter().zip(&bad.layers) {
        assert_eq!(g.islands.len(), 1, "layer {}", g.index);
        assert_eq!(b.islands.len(), 1, "layer {}", b.index);
        assert!(b.islands[0].outlines.outer.is_ccw());
        // the repaired outline encloses the same cross-section
        let ga = g.islands[0].outlines.outer.signed_area2();
        let ba = b.islands[0].outlines.outer.signed_area2();
        let diff = (ga - ba).abs() as Real / ga.max(1) as Real;
        assert!(diff < 0.01, "layer {} areas {ga} vs {ba}", g.index);
    }
}

#[test]
fn gap_in_mesh_closes_with_wide_tolerance() {
    // tube with one outer wall pulled 0.5 mm away, leaving two gaps
    let make = |shift: Real| {
        let mut triangles = Vec::new();
        let o = 10.0;
        wall([0.0, 0.0 - shift], [o, 0.0 - shift], 4.0, &mut triangles); // shifted wall
        wall([o, 0.0], [o, o], 4.0, &mut triangles);
        wall([o, o], [0.0, o], 4.0, &mut triangles);
        wall([0.0, o], [0.0, 0.0], 4.0, &mut triangles);
        TriangleMesh::from_triangles(triangles)
    };

    let mut strict = Config::default();
    strict.tolerance = 0.001;
    strict.shells = 0;
    let strict_model = slicer::slice(make(0.5), &strict);
    // best-effort output still exists for every layer
    assert_eq!(strict_model.layers.len(), 20);

    let mut loose = Config::default();
    loose.tolerance = 0.5;
    loose.shells = 0;
    let loose_model = slicer::slice(make(0.5), &loose);
    for layer in &loose_model.layers {
        assert_eq!(layer.islands.len(), 1, "layer {}", layer.index);
        let area = layer.islands[0].outlines.outer.signed_area2() as Real / 2.0 / 1e6;
        assert!(area > 90.0, "layer {} area {area}", layer.index);
    }
}

// --------------------------------------------------------
//   Retraction accounting end to end
// --------------------------------------------------------

#[test]
fn retracts_per_layer_are_transitions_plus_one() {
    let mut cfg = Config::default();
    cfg.retract_within_island = false;
    cfg.retract_threshold = 5.0;
    cfg.shells = 1;
    cfg.infill_density = 0.1;

    // two separate towers sliced together
    let mut mesh = cube_mesh(8.0);
    let mut second = cube_mesh(8.0);
    second.translate(nalgebra::Vector3::new(20.0, 0.0, 0.0));
    let mut triangles = mesh.triangles.clone();
    triangles.extend(second.triangles.iter().cloned());
    mesh = TriangleMesh::from_triangles(triangles);

    let model = slice_and_plan(mesh, &cfg);
    // pick an interior layer: sparse fill, short in-island travels
    let layer = &model.layers[20];
    assert_eq!(layer.islands.len(), 2);
    let retracts = layer.moves.iter().filter(|m| m.de < 0.0).count();
    assert_eq!(retracts, 1 + 1, "one island transition plus layer end");
}
