//! STL (stereolithography) format support.
//!
//! Binary and ASCII files are read through `stl_io`; files are written as
//! binary STL.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::error::{MorphError, Result};
use crate::mesh::{build_from_triangles, to_face_vertex, HalfEdgeMesh};

/// Load a mesh from an STL file.
///
/// Corners with bit-identical coordinates are welded into one vertex, in
/// order of first appearance. Triangles that collapse after welding are
/// dropped.
pub fn load<P: AsRef<Path>>(path: P) -> Result<HalfEdgeMesh> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let stl = stl_io::read_stl(&mut file).map_err(|e| MorphError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut welded: HashMap<[u32; 3], usize> = HashMap::new();
    let mut faces: Vec<[usize; 3]> = Vec::with_capacity(stl.faces.len());

    for tri in &stl.faces {
        let corners = tri.vertices.map(|vi| {
            let v = &stl.vertices[vi];
            let key = [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()];
            *welded.entry(key).or_insert_with(|| {
                vertices.push(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64));
                vertices.len() - 1
            })
        });

        if corners[0] != corners[1] && corners[1] != corners[2] && corners[0] != corners[2] {
            faces.push(corners);
        }
    }

    if faces.is_empty() {
        return Err(MorphError::LoadError {
            path: path.to_path_buf(),
            message: "STL file contains no valid triangles".to_string(),
        });
    }

    build_from_triangles(&vertices, &faces)
}

/// Save a mesh to a binary STL file.
pub fn save<P: AsRef<Path>>(mesh: &HalfEdgeMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);

    let (vertices, faces) = to_face_vertex(mesh);
    let to_vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);

    let triangles: Vec<stl_io::Triangle> = faces
        .iter()
        .map(|f| {
            let [p0, p1, p2] = f.map(|i| vertices[i]);
            let n = (p1 - p0).cross(&(p2 - p0)).try_normalize(0.0).unwrap_or_else(Vector3::zeros);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [to_vertex(&p0), to_vertex(&p1), to_vertex(&p2)],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| MorphError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(())
}
