//! # patchmorph
//!
//! Hierarchical patch-based morphing between two triangle meshes that share
//! connectivity.
//!
//! The surface is split into a tree of overlapping patches. Leaves are
//! interpolated on their own; going up the tree, sibling patches are rigidly
//! aligned through the vertices they share and averaged, so the root holds a
//! globally consistent position for every vertex.
//!
//! ## Quick Start
//!
//! ```no_run
//! use patchmorph::prelude::*;
//!
//! let source: HalfEdgeMesh = patchmorph::io::load("source.off").unwrap();
//! let target: HalfEdgeMesh = patchmorph::io::load("target.off").unwrap();
//!
//! let mut morpher = Morpher::new(source, target, &MorphOptions::default()).unwrap();
//! let halfway = morpher.interpolate_mesh(0.5).unwrap();
//!
//! patchmorph::io::save(&halfway, "halfway.off").unwrap();
//! ```
//!
//! ## Working with the stages directly
//!
//! ```
//! use patchmorph::prelude::*;
//! use patchmorph::mesh::primitives::torus;
//!
//! let mesh = torus(20, 10, 2.0, 0.5).unwrap();
//! let options = HierarchyOptions::default().with_seed(11);
//!
//! let mut hierarchy = build_hierarchy(&mesh, &options).unwrap();
//! annotate_registration(&mut hierarchy, &mesh);
//!
//! let stats = hierarchy.stats();
//! println!("{} leaves, depth {}..{}", stats.leaf_count, stats.min_depth, stats.max_depth);
//! assert!(stats.max_depth < options.depth_bound);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod io;
pub mod mesh;
pub mod morph;

/// Prelude module for convenient imports.
///
/// ```
/// use patchmorph::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{MorphError, Result};
    pub use crate::mesh::{build_from_triangles, FaceId, HalfEdgeMesh, SurfaceMesh, VertexId};
    pub use crate::morph::{
        annotate_registration, build_hierarchy, compute_interpolated_positions, HierarchyOptions, KabschSolver,
        LeafInterpolator, LinearInterpolator, MorphOptions, Morpher, MultiRegionSolver, OverlapPolicy,
        PatchHierarchy, RigidBlendInterpolator, RigidTransform,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_octahedron_round_trip() {
        let vertices = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
        assert!(mesh.is_valid());
        assert_eq!(mesh.num_boundary_halfedges(), 0);

        let options = MorphOptions::default()
            .with_hierarchy(HierarchyOptions::default().with_branching(2).with_leaf_size(4).with_seed(0));
        let mut morpher = Morpher::new(mesh.clone(), mesh.clone(), &options).unwrap();
        let points = morpher.interpolate(0.5).unwrap();
        for (p, q) in points.iter().zip(mesh.positions()) {
            assert!((p - q).norm() < 1e-9);
        }
    }
}
