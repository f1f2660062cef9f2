//! Mesh file I/O.
//!
//! Source and target shapes are read from, and morph results written to,
//! ordinary triangle mesh files. The format is picked from the extension.
//!
//! | Format | Extension | Load | Save |
//! |--------|-----------|------|------|
//! | Object File Format | `.off` | ✓ | ✓ |
//! | STL | `.stl` | ✓ | ✓ |
//! | PLY | `.ply` | ✓ | ✓ |
//!
//! STL stores triangles without shared vertices; loading welds coincident
//! corners in file order, so two STL files are only morph-compatible when
//! they were written from meshes with the same connectivity.
//!
//! ```no_run
//! use patchmorph::io::{load, save};
//! use patchmorph::mesh::HalfEdgeMesh;
//!
//! let mesh: HalfEdgeMesh = load("source.off").unwrap();
//! save(&mesh, "copy.ply").unwrap();
//! ```

pub mod off;
pub mod ply;
pub mod stl;

use std::path::Path;

use crate::error::{MorphError, Result};
use crate::mesh::HalfEdgeMesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Object File Format.
    Off,
    /// STL (stereolithography) format.
    Stl,
    /// PLY (Stanford polygon) format.
    Ply,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "off" => Some(Format::Off),
            "stl" => Some(Format::Stl),
            "ply" => Some(Format::Ply),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn detect(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| MorphError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a mesh from a file with automatic format detection.
pub fn load<P: AsRef<Path>>(path: P) -> Result<HalfEdgeMesh> {
    let path = path.as_ref();
    let mesh = match detect(path)? {
        Format::Off => off::load(path),
        Format::Stl => stl::load(path),
        Format::Ply => ply::load(path),
    }?;
    log::debug!(
        "loaded {}: {} vertices, {} faces",
        path.display(),
        mesh.num_vertices(),
        mesh.num_faces()
    );
    Ok(mesh)
}

/// Save a mesh to a file with automatic format detection.
pub fn save<P: AsRef<Path>>(mesh: &HalfEdgeMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Off => off::save(mesh, path),
        Format::Stl => stl::save(mesh, path),
        Format::Ply => ply::save(mesh, path),
    }
}
