//! Mesh construction from face-vertex lists.

use std::collections::HashMap;

use nalgebra::Point3;

use super::halfedge::{HalfEdge, HalfEdgeMesh};
use super::index::{FaceId, HalfEdgeId, VertexId};
use crate::error::{MorphError, Result};

/// Build a half-edge mesh from vertices and triangle faces.
///
/// Faces are validated for out-of-range and repeated vertex indices, and a
/// directed edge may be used by at most one face. Edges with no opposite
/// face get a boundary half-edge as twin.
///
/// # Example
/// ```
/// use patchmorph::mesh::{build_from_triangles, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
/// assert_eq!(mesh.num_faces(), 1);
/// assert_eq!(mesh.num_halfedges(), 6);
/// ```
pub fn build_from_triangles(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<HalfEdgeMesh> {
    if faces.is_empty() {
        return Err(MorphError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        if let Some(&vi) = face.iter().find(|&&vi| vi >= vertices.len()) {
            return Err(MorphError::InvalidVertexIndex { face: fi, vertex: vi });
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MorphError::DegenerateFace { face: fi });
        }
    }

    let mut mesh = HalfEdgeMesh {
        positions: vertices.to_vec(),
        halfedges: Vec::with_capacity(faces.len() * 3 + faces.len() / 2),
        faces: Vec::with_capacity(faces.len()),
    };

    let mut directed: HashMap<(usize, usize), HalfEdgeId> = HashMap::with_capacity(faces.len() * 3);

    for (fi, face) in faces.iter().enumerate() {
        let base = mesh.halfedges.len();
        let face_id = FaceId::new(fi);
        mesh.faces.push(HalfEdgeId::new(base));

        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            let id = HalfEdgeId::new(base + k);
            if directed.insert((a, b), id).is_some() {
                return Err(MorphError::NonManifoldEdge { v0: a, v1: b });
            }
            mesh.halfedges.push(HalfEdge {
                origin: VertexId::new(a),
                twin: HalfEdgeId::invalid(),
                next: HalfEdgeId::new(base + (k + 1) % 3),
                face: face_id,
            });
        }
    }

    // Link twins; unmatched edges get a boundary half-edge.
    let interior = mesh.halfedges.len();
    for i in 0..interior {
        let he = HalfEdgeId::new(i);
        let a = mesh.halfedges[i].origin.index();
        let next = mesh.halfedges[i].next;
        let b = mesh.halfedge(next).origin.index();

        match directed.get(&(b, a)) {
            Some(&twin) => mesh.halfedges[i].twin = twin,
            None => {
                let boundary = HalfEdgeId::new(mesh.halfedges.len());
                mesh.halfedges.push(HalfEdge {
                    origin: VertexId::new(b),
                    twin: he,
                    next: HalfEdgeId::invalid(),
                    face: FaceId::invalid(),
                });
                mesh.halfedges[i].twin = boundary;
            }
        }
    }

    Ok(mesh)
}

/// Convert a half-edge mesh back to a face-vertex representation.
///
/// Returns a `(vertices, faces)` tuple suitable for writing to disk.
pub fn to_face_vertex(mesh: &HalfEdgeMesh) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let faces = mesh
        .face_ids()
        .map(|f| mesh.face_triangle(f).map(VertexId::index))
        .collect();
    (mesh.positions().to_vec(), faces)
}
