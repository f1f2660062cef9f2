//! The mesh interface consumed by the morphing core.

use nalgebra::Point3;

use super::index::{FaceId, VertexId};

/// Read-only access to a triangle surface.
///
/// The hierarchy builder only needs face adjacency, the registration pass
/// needs the face to vertex relation, and leaf interpolators read positions.
/// Implementations must not change while a hierarchy built from them is in
/// use.
pub trait SurfaceMesh {
    /// Number of vertices.
    fn num_vertices(&self) -> usize;

    /// Number of faces.
    fn num_faces(&self) -> usize;

    /// All face ids.
    fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_;

    /// All vertex ids, in mesh order.
    fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_;

    /// Faces sharing an edge with `face`.
    fn adjacent_faces(&self, face: FaceId) -> impl Iterator<Item = FaceId> + '_;

    /// Vertices bounding `face`.
    fn face_vertices(&self, face: FaceId) -> impl Iterator<Item = VertexId> + '_;

    /// Position of a vertex.
    fn position(&self, vertex: VertexId) -> Point3<f64>;
}
