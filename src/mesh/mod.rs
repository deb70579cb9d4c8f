//! Triangle soup input mesh and the placement transforms applied before
//! slicing.

use nalgebra::{Point3, Vector3};

use crate::float_types::Real;

/// One mesh facet. Vertex winding is counter-clockwise seen from
/// outside the solid; that winding, not the file's normal record, is
/// what orients the slice segments.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [Point3<Real>; 3],
}

/// An indexed-free triangle soup with its axis-aligned bounding box.
/// Transforms update the vertices and the box in tandem so the box is
/// always current without a rescan.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    pub triangles: Vec<Triangle>,
    pub mins: Point3<Real>,
    pub maxs: Point3<Real>,
}

impl TriangleMesh {
    pub fn from_triangles(triangles: Vec<Triangle>) -> TriangleMesh {
        let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
        let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
        for tri in &triangles {
            for v in &tri.vertices {
                mins.x = mins.x.min(v.x);
                mins.y = mins.y.min(v.y);
                mins.z = mins.z.min(v.z);
                maxs.x = maxs.x.max(v.x);
                maxs.y = maxs.y.max(v.y);
                maxs.z = maxs.z.max(v.z);
            }
        }
        TriangleMesh {
            triangles,
            mins,
            maxs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Height of the printable part: everything below z = 0 is cropped
    /// by the slicer.
    pub fn cropped_height(&self) -> Real {
        self.maxs.z.max(0.0)
    }

    /// Uniform scale about the origin.
    pub fn scale(&mut self, factor: Real) {
        for tri in &mut self.triangles {
            for v in &mut tri.vertices {
                v.coords *= factor;
            }
        }
        self.mins.coords *= factor;
        self.maxs.coords *= factor;
    }

    pub fn translate(&mut self, offset: Vector3<Real>) {
        for tri in &mut self.triangles {
            for v in &mut tri.vertices {
                v.coords += offset;
            }
        }
        self.mins.coords += offset;
        self.maxs.coords += offset;
    }

    /// Center the XY bounding box on (`x`, `y`) and rest the lowest
    /// point on z = 0, then sink by `z_chop` (the sunk part is cropped
    /// during slicing).
    pub fn place(&mut self, x: Real, y: Real, z_chop: Real) {
        if self.is_empty() {
            return;
        }
        let cx = (self.mins.x + self.maxs.x) * 0.5;
        let cy = (self.mins.y + self.maxs.y) * 0.5;
        self.translate(Vector3::new(x - cx, y - cy, -self.mins.z - z_chop));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(a: [Real; 3], b: [Real; 3], c: [Real; 3]) -> Triangle {
        Triangle {
            vertices: [
                Point3::new(a[0], a[1], a[2]),
                Point3::new(b[0], b[1], b[2]),
                Point3::new(c[0], c[1], c[2]),
            ],
        }
    }

    #[test]
    fn bounding_box_tracks_transforms() {
        let mut mesh = TriangleMesh::from_triangles(vec![tri(
            [0.0, 0.0, 1.0],
            [10.0, 0.0, 1.0],
            [0.0, 10.0, 6.0],
        )]);
        assert_eq!(mesh.mins.z, 1.0);
        assert_eq!(mesh.maxs.z, 6.0);

        mesh.scale(2.0);
        assert_eq!(mesh.maxs.x, 20.0);
        assert_eq!(mesh.maxs.z, 12.0);

        mesh.place(0.0, 0.0, 0.0);
        assert!((mesh.mins.z).abs() < 1e-12);
        assert!((mesh.mins.x + mesh.maxs.x).abs() < 1e-9);
    }

    #[test]
    fn sunk_mesh_reports_cropped_height() {
        let mut mesh = TriangleMesh::from_triangles(vec![tri(
            [0.0, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [0.0, 10.0, 4.0],
        )]);
        mesh.place(0.0, 0.0, 1.0);
        assert!((mesh.mins.z + 1.0).abs() < 1e-12);
        assert!((mesh.cropped_height() - 3.0).abs() < 1e-12);
    }
}
