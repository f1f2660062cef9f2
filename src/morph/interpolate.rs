//! Leaf interpolators.
//!
//! - [`LinearInterpolator`]: straight-line blend per vertex
//! - [`RigidBlendInterpolator`]: blends the best-fit rigid motion of the
//!   leaf, so rotating parts turn instead of shrinking through the middle
//!
//! Both reproduce the source positions at `t = 0` and the target positions
//! at `t = 1`.

use nalgebra::{Point3, UnitQuaternion};

use super::compose::{LeafInterpolator, LeafPatch};
use super::transform::{centroid, RigidTransform};
use crate::error::Result;
use crate::mesh::SurfaceMesh;

/// Per-vertex linear blend `(1 - t) s + t g`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LeafInterpolator for LinearInterpolator {
    fn interpolate<M: SurfaceMesh>(
        &self,
        t: f64,
        leaf: &LeafPatch<'_>,
        source: &M,
        target: &M,
    ) -> Result<Vec<Point3<f64>>> {
        Ok(leaf
            .vertex_ids
            .iter()
            .map(|&v| source.position(v).lerp(&target.position(v), t))
            .collect())
    }
}

/// Options for [`RigidBlendInterpolator`].
#[derive(Debug, Clone)]
pub struct RigidBlendOptions {
    /// Leaves with fewer vertices fall back to the linear blend.
    pub min_vertices: usize,

    /// Blend in the non-rigid residual. Without it the leaf only moves
    /// rigidly and does not reach the target shape at `t = 1`.
    pub blend_residual: bool,
}

impl Default for RigidBlendOptions {
    fn default() -> Self {
        Self {
            min_vertices: 3,
            blend_residual: true,
        }
    }
}

impl RigidBlendOptions {
    /// Set the minimum vertex count for the rigid path.
    pub fn with_min_vertices(mut self, min_vertices: usize) -> Self {
        self.min_vertices = min_vertices;
        self
    }

    /// Enable or disable residual blending.
    pub fn with_blend_residual(mut self, blend_residual: bool) -> Self {
        self.blend_residual = blend_residual;
        self
    }
}

/// Interpolates the rigid part of a leaf's motion on the rotation manifold.
///
/// The leaf's best-fit rotation `R` from source to target is found with the
/// Kabsch method. At blend `t` each vertex is placed at
/// `q(t) (s - c_s) + c(t) + t r`, where `q(t)` rotates by `t` times the angle
/// of `R`, `c(t)` moves linearly between the centroids and `r` is what `R`
/// leaves unexplained at that vertex.
#[derive(Debug, Clone, Default)]
pub struct RigidBlendInterpolator {
    options: RigidBlendOptions,
}

impl RigidBlendInterpolator {
    /// Create an interpolator with the given options.
    pub fn new(options: RigidBlendOptions) -> Self {
        Self { options }
    }
}

impl LeafInterpolator for RigidBlendInterpolator {
    fn interpolate<M: SurfaceMesh>(
        &self,
        t: f64,
        leaf: &LeafPatch<'_>,
        source: &M,
        target: &M,
    ) -> Result<Vec<Point3<f64>>> {
        if leaf.vertex_ids.len() < self.options.min_vertices.max(1) {
            return LinearInterpolator.interpolate(t, leaf, source, target);
        }

        let from: Vec<Point3<f64>> = leaf.vertex_ids.iter().map(|&v| source.position(v)).collect();
        let to: Vec<Point3<f64>> = leaf.vertex_ids.iter().map(|&v| target.position(v)).collect();

        let fit = RigidTransform::best_fit(&from, &to);
        let from_centroid = centroid(&from);
        let to_centroid = centroid(&to);

        let rotation = UnitQuaternion::from_rotation_matrix(&fit.rotation);
        let partial = UnitQuaternion::from_scaled_axis(rotation.scaled_axis() * t);
        let center = from_centroid.lerp(&to_centroid, t);

        Ok(from
            .iter()
            .zip(&to)
            .map(|(s, g)| {
                let local = s.coords - from_centroid;
                let mut p = partial * local + center;
                if self.options.blend_residual {
                    let residual = g.coords - (fit.rotation * local + to_centroid);
                    p += residual * t;
                }
                Point3::from(p)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::grid;
    use crate::mesh::{HalfEdgeMesh, VertexId};
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector3};
    use std::f64::consts::FRAC_PI_2;

    fn rotated(mesh: &HalfEdgeMesh, transform: &RigidTransform) -> HalfEdgeMesh {
        let moved: Vec<_> = mesh.positions().iter().map(|p| transform.apply(p)).collect();
        mesh.with_positions(&moved).unwrap()
    }

    fn whole(mesh: &HalfEdgeMesh) -> (Vec<crate::mesh::FaceId>, Vec<VertexId>) {
        (mesh.face_ids().collect(), mesh.vertex_ids().collect())
    }

    #[test]
    fn test_linear_blend() {
        let source = grid(2, 2).unwrap();
        let target = rotated(&source, &RigidTransform::from_translation(Vector3::new(2.0, 0.0, 0.0)));
        let (faces, vertices) = whole(&source);
        let leaf = LeafPatch {
            face_ids: &faces,
            vertex_ids: &vertices,
        };

        let mid = LinearInterpolator.interpolate(0.25, &leaf, &source, &target).unwrap();
        for (p, s) in mid.iter().zip(source.positions()) {
            assert_relative_eq!(*p, s + Vector3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rigid_blend_hits_endpoints() {
        let source = grid(3, 2).unwrap();
        let mut target = rotated(
            &source,
            &RigidTransform::new(Rotation3::from_euler_angles(0.2, -0.1, 1.0), Vector3::new(0.0, 1.0, 2.0)),
        );
        // Some non-rigid change as well.
        let bumped = *target.position(VertexId::new(5)) + Vector3::new(0.0, 0.0, 0.3);
        target.set_position(VertexId::new(5), bumped);

        let (faces, vertices) = whole(&source);
        let leaf = LeafPatch {
            face_ids: &faces,
            vertex_ids: &vertices,
        };
        let interpolator = RigidBlendInterpolator::default();

        let start = interpolator.interpolate(0.0, &leaf, &source, &target).unwrap();
        let end = interpolator.interpolate(1.0, &leaf, &source, &target).unwrap();
        for (p, s) in start.iter().zip(source.positions()) {
            assert_relative_eq!(*p, *s, epsilon = 1e-9);
        }
        for (p, g) in end.iter().zip(target.positions()) {
            assert_relative_eq!(*p, *g, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rigid_blend_preserves_shape_midway() {
        let source = grid(2, 2).unwrap();
        let turn = RigidTransform::new(Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2), Vector3::zeros());
        let target = rotated(&source, &turn);
        let (faces, vertices) = whole(&source);
        let leaf = LeafPatch {
            face_ids: &faces,
            vertex_ids: &vertices,
        };

        let mid = RigidBlendInterpolator::default()
            .interpolate(0.5, &leaf, &source, &target)
            .unwrap();
        // Rigid motion keeps every edge length; a linear blend would shrink them.
        let a = source.positions()[0];
        let b = source.positions()[8];
        assert_relative_eq!((mid[0] - mid[8]).norm(), (a - b).norm(), epsilon = 1e-9);
    }

    #[test]
    fn test_small_leaf_falls_back_to_linear() {
        let source = grid(1, 1).unwrap();
        let target = rotated(&source, &RigidTransform::from_translation(Vector3::new(0.0, 0.0, 1.0)));
        let vertices = vec![VertexId::new(0), VertexId::new(3)];
        let leaf = LeafPatch {
            face_ids: &[],
            vertex_ids: &vertices,
        };
        let rigid = RigidBlendInterpolator::new(RigidBlendOptions::default().with_min_vertices(3))
            .interpolate(0.5, &leaf, &source, &target)
            .unwrap();
        let linear = LinearInterpolator.interpolate(0.5, &leaf, &source, &target).unwrap();
        assert_eq!(rigid, linear);
    }
}
