//! Half-edge triangle mesh.
//!
//! Each edge is stored as two opposite half-edges. A half-edge knows its
//! origin vertex, its twin, the next half-edge around its face and the face
//! itself. Half-edges on an open boundary have an invalid face, so walking
//! `twin` from an interior half-edge and reading `face` yields the edge
//! neighbour of a face or nothing.

use nalgebra::{Point3, Vector3};

use super::index::{FaceId, HalfEdgeId, VertexId};
use super::surface::SurfaceMesh;
use crate::error::{MorphError, Result};

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfEdge {
    /// The vertex this half-edge leaves from.
    pub origin: VertexId,
    /// The opposite half-edge.
    pub twin: HalfEdgeId,
    /// The next half-edge around the face.
    pub next: HalfEdgeId,
    /// The incident face, invalid on the boundary.
    pub face: FaceId,
}

impl HalfEdge {
    /// Check if this half-edge lies on an open boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !self.face.is_valid()
    }
}

/// A half-edge mesh of triangles.
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    pub(crate) positions: Vec<Point3<f64>>,
    pub(crate) halfedges: Vec<HalfEdge>,
    /// One half-edge per face.
    pub(crate) faces: Vec<HalfEdgeId>,
}

impl HalfEdgeMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of half-edges, boundary half-edges included.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.halfedges[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.positions[v.index()]
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId, pos: Point3<f64>) {
        self.positions[v.index()] = pos;
    }

    /// All vertex positions in vertex order.
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    // ==================== Topology ====================

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.positions.len()).map(VertexId::new)
    }

    /// Iterate over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// The three half-edges of a face, in winding order.
    pub fn face_halfedges(&self, f: FaceId) -> [HalfEdgeId; 3] {
        let he0 = self.faces[f.index()];
        let he1 = self.halfedge(he0).next;
        let he2 = self.halfedge(he1).next;
        [he0, he1, he2]
    }

    /// The three vertices of a face, in winding order.
    pub fn face_triangle(&self, f: FaceId) -> [VertexId; 3] {
        self.face_halfedges(f).map(|he| self.halfedge(he).origin)
    }

    /// Faces sharing an edge with `f`. Boundary edges contribute nothing.
    pub fn face_neighbors(&self, f: FaceId) -> impl Iterator<Item = FaceId> + '_ {
        self.face_halfedges(f).into_iter().filter_map(move |he| {
            let twin = self.halfedge(he).twin;
            if !twin.is_valid() {
                return None;
            }
            let face = self.halfedge(twin).face;
            face.is_valid().then_some(face)
        })
    }

    /// Number of half-edges on an open boundary.
    pub fn num_boundary_halfedges(&self) -> usize {
        self.halfedges.iter().filter(|he| he.is_boundary()).count()
    }

    /// Check whether two meshes have the same vertex count and face list.
    ///
    /// Morphing requires a one-to-one vertex and face correspondence, which
    /// holds exactly when both meshes were built from the same triangles.
    pub fn same_connectivity(&self, other: &HalfEdgeMesh) -> bool {
        self.num_vertices() == other.num_vertices()
            && self.num_faces() == other.num_faces()
            && self
                .face_ids()
                .all(|f| self.face_triangle(f) == other.face_triangle(f))
    }

    // ==================== Geometry ====================

    /// Compute the area of a face.
    pub fn face_area(&self, f: FaceId) -> f64 {
        let [v0, v1, v2] = self.face_triangle(f);
        let p0 = self.position(v0);
        let e1: Vector3<f64> = self.position(v1) - p0;
        let e2: Vector3<f64> = self.position(v2) - p0;
        0.5 * e1.cross(&e2).norm()
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.face_ids().map(|f| self.face_area(f)).sum()
    }

    /// Compute the bounding box of the mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold((first, first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        }))
    }

    /// Return a copy of this mesh with every vertex moved.
    ///
    /// `positions` is indexed by vertex, matching [`HalfEdgeMesh::vertex_ids`].
    pub fn with_positions(&self, positions: &[Point3<f64>]) -> Result<HalfEdgeMesh> {
        if positions.len() != self.num_vertices() {
            return Err(MorphError::invalid_param(
                "positions",
                positions.len(),
                "must provide one position per vertex",
            ));
        }
        let mut mesh = self.clone();
        mesh.positions.copy_from_slice(positions);
        Ok(mesh)
    }

    // ==================== Validation ====================

    /// Check connectivity consistency: twins are mutual and every face is a
    /// closed loop of three half-edges that point back to it.
    pub fn is_valid(&self) -> bool {
        for (i, he) in self.halfedges.iter().enumerate() {
            if he.twin.is_valid() && self.halfedge(he.twin).twin.index() != i {
                return false;
            }
        }
        self.face_ids().all(|f| {
            let [he0, _, he2] = self.face_halfedges(f);
            self.halfedge(he2).next == he0
                && self.face_halfedges(f).iter().all(|&he| self.halfedge(he).face == f)
        })
    }
}

impl SurfaceMesh for HalfEdgeMesh {
    fn num_vertices(&self) -> usize {
        HalfEdgeMesh::num_vertices(self)
    }

    fn num_faces(&self) -> usize {
        HalfEdgeMesh::num_faces(self)
    }

    fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        HalfEdgeMesh::face_ids(self)
    }

    fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        HalfEdgeMesh::vertex_ids(self)
    }

    fn adjacent_faces(&self, face: FaceId) -> impl Iterator<Item = FaceId> + '_ {
        self.face_neighbors(face)
    }

    fn face_vertices(&self, face: FaceId) -> impl Iterator<Item = VertexId> + '_ {
        self.face_triangle(face).into_iter()
    }

    fn position(&self, vertex: VertexId) -> Point3<f64> {
        self.positions[vertex.index()]
    }
}
