//! Build-once, morph-many driver.

use nalgebra::Point3;

use super::compose::{check_meshes_match, compute_interpolated_positions_with_options, ComposeOptions};
use super::compose::{LeafInterpolator, MultiRegionSolver};
use super::hierarchy::{build_hierarchy_with_progress, HierarchyOptions};
use super::interpolate::RigidBlendInterpolator;
use super::patch::PatchHierarchy;
use super::registration::annotate_registration;
use super::solver::KabschSolver;
use super::Progress;
use crate::error::{MorphError, Result};
use crate::mesh::{HalfEdgeMesh, SurfaceMesh};

/// Options for a [`Morpher`].
#[derive(Debug, Clone, Default)]
pub struct MorphOptions {
    /// Hierarchy construction.
    pub hierarchy: HierarchyOptions,
    /// Composition.
    pub compose: ComposeOptions,
}

impl MorphOptions {
    /// Set the hierarchy options.
    pub fn with_hierarchy(mut self, hierarchy: HierarchyOptions) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Set the composition options.
    pub fn with_compose(mut self, compose: ComposeOptions) -> Self {
        self.compose = compose;
        self
    }

    /// Disable all parallelism.
    pub fn sequential(mut self) -> Self {
        self.compose.parallel = false;
        self
    }
}

/// Morphs between two meshes with identical connectivity.
///
/// The hierarchy is built and annotated once from the source mesh; every
/// call to [`Morpher::interpolate`] reuses it.
///
/// # Example
///
/// ```
/// use patchmorph::mesh::primitives::torus;
/// use patchmorph::morph::{HierarchyOptions, MorphOptions, Morpher};
///
/// let source = torus(12, 6, 2.0, 0.5).unwrap();
/// let target = torus(12, 6, 2.0, 0.8).unwrap();
/// let options = MorphOptions::default()
///     .with_hierarchy(HierarchyOptions::default().with_leaf_size(20).with_seed(1));
///
/// let mut morpher = Morpher::new(source, target, &options).unwrap();
/// let halfway = morpher.interpolate_mesh(0.5).unwrap();
/// assert_eq!(halfway.num_faces(), 144);
/// ```
#[derive(Debug)]
pub struct Morpher<M, I = RigidBlendInterpolator, S = KabschSolver> {
    source: M,
    target: M,
    hierarchy: PatchHierarchy,
    interpolator: I,
    solver: S,
    compose: ComposeOptions,
}

impl<M: SurfaceMesh + Sync> Morpher<M> {
    /// Create a morpher with the rigid-blend interpolator and Kabsch solver.
    pub fn new(source: M, target: M, options: &MorphOptions) -> Result<Self> {
        Self::with_parts(
            source,
            target,
            options,
            RigidBlendInterpolator::default(),
            KabschSolver::default(),
            &Progress::none(),
        )
    }
}

impl<M, I, S> Morpher<M, I, S>
where
    M: SurfaceMesh + Sync,
    I: LeafInterpolator,
    S: MultiRegionSolver,
{
    /// Create a morpher with a custom interpolator and solver, reporting
    /// hierarchy attempts to `progress`.
    pub fn with_parts(
        source: M,
        target: M,
        options: &MorphOptions,
        interpolator: I,
        solver: S,
        progress: &Progress,
    ) -> Result<Self> {
        check_meshes_match(&source, &target)?;
        check_same_faces(&source, &target)?;

        let mut rng = options.hierarchy.rng();
        let mut hierarchy = build_hierarchy_with_progress(&source, &options.hierarchy, &mut rng, progress)?;
        annotate_registration(&mut hierarchy, &source);

        Ok(Self {
            source,
            target,
            hierarchy,
            interpolator,
            solver,
            compose: options.compose.clone(),
        })
    }

    /// The annotated hierarchy.
    pub fn hierarchy(&self) -> &PatchHierarchy {
        &self.hierarchy
    }

    /// The source mesh.
    pub fn source(&self) -> &M {
        &self.source
    }

    /// The target mesh.
    pub fn target(&self) -> &M {
        &self.target
    }

    /// Vertex positions at blend `t`, in mesh vertex order.
    pub fn interpolate(&mut self, t: f64) -> Result<Vec<Point3<f64>>> {
        let points = compute_interpolated_positions_with_options(
            &mut self.hierarchy,
            &self.source,
            &self.target,
            t,
            &self.interpolator,
            &self.solver,
            &self.compose,
        )?;
        log::debug!("interpolated {} vertices at t = {}", points.len(), t);
        Ok(points)
    }

    /// `frames` evenly spaced states from the source (`t = 0`) to the
    /// target (`t = 1`).
    pub fn sequence(&mut self, frames: usize) -> Result<Vec<Vec<Point3<f64>>>> {
        self.sequence_with_progress(frames, &Progress::none())
    }

    /// [`Morpher::sequence`] with progress reporting per frame.
    pub fn sequence_with_progress(&mut self, frames: usize, progress: &Progress) -> Result<Vec<Vec<Point3<f64>>>> {
        let steps = frame_times(frames)?;
        let mut out = Vec::with_capacity(frames);
        for (k, t) in steps.into_iter().enumerate() {
            progress.report(k, frames, "Interpolating frames");
            out.push(self.interpolate(t)?);
        }
        progress.report(frames, frames, "Interpolating frames");
        log::info!("interpolated {} frames", frames);
        Ok(out)
    }
}

impl<I, S> Morpher<HalfEdgeMesh, I, S>
where
    I: LeafInterpolator,
    S: MultiRegionSolver,
{
    /// The source mesh with its vertices moved to blend `t`.
    pub fn interpolate_mesh(&mut self, t: f64) -> Result<HalfEdgeMesh> {
        let points = self.interpolate(t)?;
        self.source.with_positions(&points)
    }
}

/// Blend parameters for `frames` evenly spaced frames, both ends included.
pub fn frame_times(frames: usize) -> Result<Vec<f64>> {
    if frames < 2 {
        return Err(MorphError::invalid_param("frames", frames, "need at least 2 frames"));
    }
    let last = (frames - 1) as f64;
    Ok((0..frames).map(|k| k as f64 / last).collect())
}

fn check_same_faces<M: SurfaceMesh>(source: &M, target: &M) -> Result<()> {
    for (a, b) in source.face_ids().zip(target.face_ids()) {
        if a != b || !source.face_vertices(a).eq(target.face_vertices(b)) {
            return Err(MorphError::MeshMismatch {
                details: format!("face {} has different vertices", a.index()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use crate::mesh::primitives::{grid, torus};
    use crate::morph::LinearInterpolator;
    use approx::assert_relative_eq;

    fn options() -> MorphOptions {
        MorphOptions::default().with_hierarchy(HierarchyOptions::default().with_leaf_size(16).with_seed(5))
    }

    #[test]
    fn test_endpoints_with_translated_target() {
        let source = torus(12, 6, 2.0, 0.5).unwrap();
        let shift = nalgebra::Vector3::new(0.0, 0.0, 1.0);
        let moved: Vec<_> = source.positions().iter().map(|p| p + shift).collect();
        let target = source.with_positions(&moved).unwrap();

        let mut morpher = Morpher::new(source.clone(), target, &options()).unwrap();
        let start = morpher.interpolate(0.0).unwrap();
        for (p, s) in start.iter().zip(source.positions()) {
            assert_relative_eq!(*p, *s, epsilon = 1e-9);
        }
        assert!(morpher.hierarchy().is_annotated());
    }

    #[test]
    fn test_sequence_frames() {
        let source = grid(6, 6).unwrap();
        let target = source.clone();
        let mut morpher =
            Morpher::with_parts(source, target, &options(), LinearInterpolator, KabschSolver::default(), &Progress::none())
                .unwrap();
        let frames = morpher.sequence(4).unwrap();
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| f.len() == 49));
        assert!(morpher.sequence(1).is_err());
    }

    #[test]
    fn test_frame_times() {
        assert_eq!(frame_times(3).unwrap(), vec![0.0, 0.5, 1.0]);
        assert!(frame_times(0).is_err());
    }

    #[test]
    fn test_rejects_mismatched_faces() {
        let vertices = vec![
            nalgebra::Point3::new(0.0, 0.0, 0.0),
            nalgebra::Point3::new(1.0, 0.0, 0.0),
            nalgebra::Point3::new(1.0, 1.0, 0.0),
            nalgebra::Point3::new(0.0, 1.0, 0.0),
        ];
        let a = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
        let b = build_from_triangles(&vertices, &[[0, 1, 3], [1, 2, 3]]).unwrap();
        let err = Morpher::new(a, b, &options()).unwrap_err();
        assert!(matches!(err, MorphError::MeshMismatch { .. }));
    }
}
