//! Hierarchical patch-based morphing.
//!
//! Morphing runs in three stages:
//!
//! 1. [`build_hierarchy`] splits the mesh into a tree of overlapping patches
//!    by growing K regions at a time from random seed faces.
//! 2. [`annotate_registration`] gives every patch its vertex set and every
//!    internal node the list of child pairs that share vertices.
//! 3. [`compute_interpolated_positions`] interpolates the leaves, aligns
//!    siblings through their shared vertices and averages them upward.
//!
//! The leaf formula ([`LeafInterpolator`]) and the sibling alignment
//! ([`MultiRegionSolver`]) are pluggable. [`Morpher`] wires the stages
//! together with the built-in implementations.
//!
//! # Example
//!
//! ```
//! use patchmorph::mesh::primitives::torus;
//! use patchmorph::morph::{
//!     annotate_registration, build_hierarchy, compute_interpolated_positions, HierarchyOptions,
//!     KabschSolver, LinearInterpolator,
//! };
//!
//! let source = torus(16, 8, 2.0, 0.5).unwrap();
//! let target = torus(16, 8, 2.5, 0.5).unwrap();
//!
//! let mut hierarchy = build_hierarchy(&source, &HierarchyOptions::default().with_seed(3)).unwrap();
//! annotate_registration(&mut hierarchy, &source);
//!
//! let points = compute_interpolated_positions(
//!     &mut hierarchy,
//!     &source,
//!     &target,
//!     0.5,
//!     &LinearInterpolator,
//!     &KabschSolver::default(),
//! )
//! .unwrap();
//! assert_eq!(points.len(), 128);
//! ```

mod compose;
mod hierarchy;
mod interpolate;
mod morpher;
mod patch;
mod progress;
mod registration;
mod solver;
mod transform;

pub use compose::{
    check_meshes_match, compose, compute_interpolated_positions, compute_interpolated_positions_with_options,
    ComposeOptions, LeafInterpolator, LeafPatch, MultiRegionSolver, PairCorrespondence,
};
pub use hierarchy::{
    build_hierarchy, build_hierarchy_with_progress, build_hierarchy_with_rng, select_seeds, split_patch,
    HierarchyOptions, OverlapPolicy,
};
pub use interpolate::{LinearInterpolator, RigidBlendInterpolator, RigidBlendOptions};
pub use morpher::{frame_times, MorphOptions, Morpher};
pub use patch::{HierarchyStats, PatchHierarchy, PatchNode, PatchPath, SiblingPair};
pub use progress::Progress;
pub use registration::{annotate_node, annotate_registration, sorted_intersection};
pub use solver::{KabschSolver, SolverOptions};
pub use transform::RigidTransform;
