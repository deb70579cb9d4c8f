//! STL import using `stl_io`.
//!
//! Binary STL is the wire format we care about (80-byte header, u32
//! triangle count, 50 bytes per facet, all little-endian); `stl_io`
//! also accepts the ASCII dialect for free. The per-facet normal and
//! attribute words are ignored, vertex winding carries orientation.

use std::io::{Cursor, Read};
use std::path::Path;

use nalgebra::Point3;

use crate::errors::Result;
use crate::float_types::Real;
use crate::mesh::{Triangle, TriangleMesh};

/// Parse STL bytes into a mesh.
pub fn read_stl(data: &[u8]) -> Result<TriangleMesh> {
    let mut cursor = Cursor::new(data);
    let stl_reader = stl_io::create_stl_reader(&mut cursor)?;

    let mut triangles = Vec::new();
    for tri_result in stl_reader {
        let tri = tri_result?;
        triangles.push(Triangle {
            vertices: [
                Point3::new(
                    tri.vertices[0][0] as Real,
                    tri.vertices[0][1] as Real,
                    tri.vertices[0][2] as Real,
                ),
                Point3::new(
                    tri.vertices[1][0] as Real,
                    tri.vertices[1][1] as Real,
                    tri.vertices[1][2] as Real,
                ),
                Point3::new(
                    tri.vertices[2][0] as Real,
                    tri.vertices[2][1] as Real,
                    tri.vertices[2][2] as Real,
                ),
            ],
        });
    }

    Ok(TriangleMesh::from_triangles(triangles))
}

/// Load a mesh from `path`, or from standard input when `path` is `-`.
pub fn load_mesh(path: &Path) -> Result<TriangleMesh> {
    let data = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(path)?
    };
    read_stl(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assembled binary STL with a single facet.
    fn one_triangle_stl() -> Vec<u8> {
        let mut data = vec![0u8; 80]; // header, ignored
        data.extend_from_slice(&1u32.to_le_bytes());
        // normal, ignored
        for _ in 0..3 {
            data.extend_from_slice(&0f32.to_le_bytes());
        }
        let verts: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 5.0]];
        for v in verts {
            for c in v {
                data.extend_from_slice(&c.to_le_bytes());
            }
        }
        data.extend_from_slice(&0u16.to_le_bytes()); // attribute, ignored
        data
    }

    #[test]
    fn reads_binary_stl() {
        let mesh = read_stl(&one_triangle_stl()).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.maxs.z, 5.0);
        assert_eq!(mesh.maxs.x, 10.0);
        assert_eq!(mesh.mins.y, 0.0);
    }
}
