//! Core mesh data structures.
//!
//! The morphing core talks to meshes only through the [`SurfaceMesh`] trait.
//! [`HalfEdgeMesh`] is the implementation used by the file loaders and the
//! command-line tool.
//!
//! # Construction
//!
//! ```
//! use patchmorph::mesh::{build_from_triangles, HalfEdgeMesh, SurfaceMesh};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! let first = mesh.face_ids().next().unwrap();
//! assert_eq!(SurfaceMesh::adjacent_faces(&mesh, first).count(), 1);
//! ```

mod builder;
mod halfedge;
mod index;
pub mod primitives;
mod surface;

pub use builder::{build_from_triangles, to_face_vertex};
pub use halfedge::{HalfEdge, HalfEdgeMesh};
pub use index::{FaceId, HalfEdgeId, VertexId};
pub use surface::SurfaceMesh;
