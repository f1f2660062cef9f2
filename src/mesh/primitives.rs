//! Procedural triangle meshes.
//!
//! Closed and open test surfaces with a predictable face count, handy for
//! trying out hierarchy parameters without any files on disk.

use std::f64::consts::TAU;

use nalgebra::Point3;

use super::builder::build_from_triangles;
use super::halfedge::HalfEdgeMesh;
use crate::error::{MorphError, Result};

/// A closed torus with `2 * rings * sides` triangles.
///
/// `rings` counts segments around the main axis, `sides` segments around
/// the tube.
pub fn torus(rings: usize, sides: usize, major_radius: f64, minor_radius: f64) -> Result<HalfEdgeMesh> {
    if rings < 3 || sides < 3 {
        return Err(MorphError::invalid_param(
            "rings/sides",
            format!("{rings}/{sides}"),
            "a torus needs at least 3 segments each way",
        ));
    }

    let mut vertices = Vec::with_capacity(rings * sides);
    for i in 0..rings {
        let u = TAU * i as f64 / rings as f64;
        for j in 0..sides {
            let v = TAU * j as f64 / sides as f64;
            let r = major_radius + minor_radius * v.cos();
            vertices.push(Point3::new(r * u.cos(), r * u.sin(), minor_radius * v.sin()));
        }
    }

    let index = |i: usize, j: usize| (i % rings) * sides + (j % sides);
    let mut faces = Vec::with_capacity(2 * rings * sides);
    for i in 0..rings {
        for j in 0..sides {
            let (a, b, c, d) = (index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1));
            faces.push([a, b, c]);
            faces.push([a, c, d]);
        }
    }

    build_from_triangles(&vertices, &faces)
}

/// An open `nx` by `ny` grid of unit squares in the XY plane, two triangles
/// per square, vertices numbered row by row.
pub fn grid(nx: usize, ny: usize) -> Result<HalfEdgeMesh> {
    if nx == 0 || ny == 0 {
        return Err(MorphError::invalid_param(
            "nx/ny",
            format!("{nx}/{ny}"),
            "grid must have at least one cell",
        ));
    }

    let vertices: Vec<_> = (0..=ny)
        .flat_map(|j| (0..=nx).map(move |i| Point3::new(i as f64, j as f64, 0.0)))
        .collect();

    let mut faces = Vec::with_capacity(nx * ny * 2);
    for j in 0..ny {
        for i in 0..nx {
            let v00 = j * (nx + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + nx + 1;
            let v11 = v01 + 1;
            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    build_from_triangles(&vertices, &faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torus_is_closed() {
        let mesh = torus(20, 10, 2.0, 0.5).unwrap();
        assert_eq!(mesh.num_faces(), 400);
        assert_eq!(mesh.num_vertices(), 200);
        assert_eq!(mesh.num_boundary_halfedges(), 0);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_grid_counts() {
        let mesh = grid(3, 2).unwrap();
        assert_eq!(mesh.num_faces(), 12);
        assert_eq!(mesh.num_vertices(), 12);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        assert!(torus(2, 10, 1.0, 0.1).is_err());
        assert!(grid(0, 4).is_err());
    }
}
