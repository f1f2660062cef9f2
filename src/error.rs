//! Error types for patchmorph.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side
//! is [`MorphError`].

use std::path::PathBuf;
use thiserror::Error;

use crate::morph::PatchPath;

/// Result type alias using [`MorphError`].
pub type Result<T> = std::result::Result<T, MorphError>;

/// Errors that can occur while building meshes, hierarchies or morphs.
#[derive(Error, Debug)]
pub enum MorphError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A directed edge is used by more than one face.
    #[error("edge ({v0}, {v1}) is used by more than one face with the same orientation")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading a mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving a mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// A patch holds fewer faces than the branching factor, so it cannot be
    /// seeded with distinct faces.
    #[error("patch with {faces} faces cannot be split into {branching} children")]
    PatchTooSmall {
        /// Faces in the patch.
        faces: usize,
        /// The branching factor.
        branching: usize,
    },

    /// Region growing could not reach every face of a patch.
    #[error("region growing stalled with {unreached} unreachable faces")]
    PatchDisconnected {
        /// Faces no child could reach.
        unreached: usize,
    },

    /// No hierarchy met the depth bound within the attempt budget.
    #[error("no hierarchy with depth below {depth_bound} after {attempts} attempts (shallowest seen: {shallowest})")]
    HierarchyUnbalanced {
        /// Attempts made.
        attempts: usize,
        /// The depth bound that had to be met.
        depth_bound: usize,
        /// Smallest rejected maximum depth.
        shallowest: usize,
    },

    /// Source and target meshes do not correspond.
    #[error("source and target meshes differ: {details}")]
    MeshMismatch {
        /// What differs.
        details: String,
    },

    /// Composition ran on a hierarchy without registration data.
    #[error("patch {node} has no vertex data; annotate the hierarchy before composing")]
    NotAnnotated {
        /// The offending node.
        node: PatchPath,
    },

    /// A vertex of a patch is not covered by any of its children.
    #[error("vertex {vertex} is not covered by any child patch")]
    UncoveredVertex {
        /// The vertex index.
        vertex: usize,
    },

    /// A leaf interpolator failed.
    #[error("leaf interpolation failed: {0}")]
    Interpolation(String),

    /// A multi-region solver failed.
    #[error("multi-region registration failed: {0}")]
    Registration(String),

    /// A collaborator failed while composing a specific patch.
    #[error("composition failed at patch {node}: {source}")]
    Composition {
        /// The patch being composed.
        node: PatchPath,
        /// The underlying failure.
        #[source]
        source: Box<MorphError>,
    },
}

impl MorphError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MorphError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Tag this error with the patch it occurred in.
    ///
    /// Errors that are already tagged keep their original (deepest) tag.
    pub fn at(self, node: &PatchPath) -> Self {
        match self {
            tagged @ MorphError::Composition { .. } => tagged,
            other => MorphError::Composition {
                node: node.clone(),
                source: Box::new(other),
            },
        }
    }
}
