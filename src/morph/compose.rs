//! Bottom-up composition of interpolated patches.
//!
//! Leaves are interpolated independently by a [`LeafInterpolator`]. At every
//! internal node the children's results are brought into one frame by a
//! [`MultiRegionSolver`], using the vertices sibling patches share as
//! correspondences, and then averaged per vertex. The root ends up with one
//! position per mesh vertex.
//!
//! Neither the leaf formula nor the solver is fixed here; both are supplied
//! by the caller.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use super::patch::{PatchHierarchy, PatchNode, PatchPath};
use super::transform::RigidTransform;
use crate::error::{MorphError, Result};
use crate::mesh::{FaceId, SurfaceMesh, VertexId};

/// The faces and vertices of one leaf patch.
#[derive(Debug, Clone, Copy)]
pub struct LeafPatch<'a> {
    /// Faces of the leaf, sorted.
    pub face_ids: &'a [FaceId],
    /// Vertices of the leaf, sorted. Results are returned in this order.
    pub vertex_ids: &'a [VertexId],
}

/// Interpolates the vertices of a single leaf patch.
pub trait LeafInterpolator: Sync {
    /// Return one position per entry of `leaf.vertex_ids` at blend `t`.
    fn interpolate<M: SurfaceMesh>(
        &self,
        t: f64,
        leaf: &LeafPatch<'_>,
        source: &M,
        target: &M,
    ) -> Result<Vec<Point3<f64>>>;
}

/// Point correspondences between two siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCorrespondence {
    /// Index of the first child.
    pub first: usize,
    /// Index of the second child.
    pub second: usize,
    /// For each shared vertex, its position in the first child and in the
    /// second child.
    pub pairs: Vec<(Point3<f64>, Point3<f64>)>,
}

/// Computes one rigid transform per child so that shared vertices coincide.
pub trait MultiRegionSolver: Sync {
    /// Return exactly `branching` transforms, one per child index.
    fn solve(&self, branching: usize, pairs: &[PairCorrespondence]) -> Result<Vec<RigidTransform>>;
}

/// Options for composition.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Compose sibling subtrees on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl ComposeOptions {
    /// Options for single-threaded composition.
    pub fn sequential() -> Self {
        Self { parallel: false }
    }

    /// Enable or disable parallel composition.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

struct Context<'a, M, I: ?Sized, S: ?Sized> {
    source: &'a M,
    target: &'a M,
    t: f64,
    interpolator: &'a I,
    solver: &'a S,
    parallel: bool,
}

/// Fill the points of `node` and its whole subtree for blend `t`.
///
/// `node` is treated as the root of the paths reported in errors. The
/// subtree must have been annotated by registration.
pub fn compose<M, I, S>(
    node: &mut PatchNode,
    source: &M,
    target: &M,
    t: f64,
    interpolator: &I,
    solver: &S,
    options: &ComposeOptions,
) -> Result<()>
where
    M: SurfaceMesh + Sync,
    I: LeafInterpolator,
    S: MultiRegionSolver + ?Sized,
{
    let ctx = Context {
        source,
        target,
        t,
        interpolator,
        solver,
        parallel: options.parallel,
    };
    compose_at(node, &PatchPath::root(), &ctx)
}

fn compose_at<M, I, S>(node: &mut PatchNode, path: &PatchPath, ctx: &Context<'_, M, I, S>) -> Result<()>
where
    M: SurfaceMesh + Sync,
    I: LeafInterpolator,
    S: MultiRegionSolver + ?Sized,
{
    if node.vertex_ids.is_empty() {
        return Err(MorphError::NotAnnotated { node: path.clone() });
    }

    if node.is_leaf() {
        let leaf = LeafPatch {
            face_ids: &node.face_ids,
            vertex_ids: &node.vertex_ids,
        };
        let points = ctx
            .interpolator
            .interpolate(ctx.t, &leaf, ctx.source, ctx.target)
            .map_err(|e| e.at(path))?;
        if points.len() != node.vertex_ids.len() {
            let message = format!("expected {} positions, got {}", node.vertex_ids.len(), points.len());
            return Err(MorphError::Interpolation(message).at(path));
        }
        if !points.iter().all(|p| p.iter().all(|x| x.is_finite())) {
            return Err(MorphError::Interpolation("non-finite position".into()).at(path));
        }
        node.points = Some(points);
        return Ok(());
    }

    if ctx.parallel {
        node.children
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, slot)| match slot {
                Some(child) => compose_at(child, &path.child(i), ctx),
                None => Ok(()),
            })?;
    } else {
        for (i, slot) in node.children.iter_mut().enumerate() {
            if let Some(child) = slot {
                compose_at(child, &path.child(i), ctx)?;
            }
        }
    }

    let correspondences = gather_correspondences(node, path)?;
    let branching = node.branching();
    let transforms = ctx
        .solver
        .solve(branching, &correspondences)
        .map_err(|e| e.at(path))?;
    if transforms.len() != branching {
        let message = format!("expected {} transforms, got {}", branching, transforms.len());
        return Err(MorphError::Registration(message).at(path));
    }
    if let Some(bad) = transforms.iter().position(|tr| !tr.is_finite()) {
        let message = format!("non-finite transform for child {}", bad);
        return Err(MorphError::Registration(message).at(path));
    }

    let mut sums = vec![Vector3::zeros(); node.vertex_ids.len()];
    let mut counts = vec![0u32; node.vertex_ids.len()];

    for (i, slot) in node.children.iter_mut().enumerate() {
        let Some(child) = slot else {
            continue;
        };
        let transform = &transforms[i];
        let points = child
            .points
            .as_mut()
            .ok_or_else(|| MorphError::NotAnnotated { node: path.child(i) })?;
        for p in points.iter_mut() {
            *p = transform.apply(p);
        }

        for (v, p) in child.vertex_ids.iter().zip(points.iter()) {
            let slot = node
                .vertex_index
                .get(v)
                .copied()
                .ok_or_else(|| MorphError::NotAnnotated { node: path.clone() })?;
            sums[slot] += p.coords;
            counts[slot] += 1;
        }
    }

    let mut points = Vec::with_capacity(sums.len());
    for (k, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
        if count == 0 {
            let vertex = node.vertex_ids[k].index();
            return Err(MorphError::UncoveredVertex { vertex }.at(path));
        }
        points.push(Point3::from(sum / f64::from(count)));
    }

    log::trace!("composed {} at depth {}: {} vertices", path, path.depth(), points.len());
    node.points = Some(points);
    Ok(())
}

/// Build the solver input for one node from its children's current points.
fn gather_correspondences(node: &PatchNode, path: &PatchPath) -> Result<Vec<PairCorrespondence>> {
    node.sibling_pairs
        .iter()
        .map(|pair| {
            let (a, a_points) = composed_child(node, pair.first, path)?;
            let (b, b_points) = composed_child(node, pair.second, path)?;

            let mut pairs = Vec::with_capacity(pair.shared.len());
            for &v in &pair.shared {
                match (a.index_of(v), b.index_of(v)) {
                    (Some(ia), Some(ib)) => pairs.push((a_points[ia], b_points[ib])),
                    _ => return Err(MorphError::NotAnnotated { node: path.clone() }),
                }
            }
            Ok(PairCorrespondence {
                first: pair.first,
                second: pair.second,
                pairs,
            })
        })
        .collect()
}

fn composed_child<'a>(node: &'a PatchNode, index: usize, path: &PatchPath) -> Result<(&'a PatchNode, &'a [Point3<f64>])> {
    let missing = || MorphError::NotAnnotated { node: path.child(index) };
    let child = node.child(index).ok_or_else(missing)?;
    let points = child.points().ok_or_else(missing)?;
    Ok((child, points))
}

/// Interpolate every vertex of the mesh at blend `t`.
///
/// Returns one position per entry of the root's vertex ids, which are the
/// mesh vertices in mesh order. The hierarchy keeps the composed points of
/// every node until the next call.
pub fn compute_interpolated_positions<M, I, S>(
    hierarchy: &mut PatchHierarchy,
    source: &M,
    target: &M,
    t: f64,
    interpolator: &I,
    solver: &S,
) -> Result<Vec<Point3<f64>>>
where
    M: SurfaceMesh + Sync,
    I: LeafInterpolator,
    S: MultiRegionSolver + ?Sized,
{
    compute_interpolated_positions_with_options(
        hierarchy,
        source,
        target,
        t,
        interpolator,
        solver,
        &ComposeOptions::default(),
    )
}

/// [`compute_interpolated_positions`] with explicit composition options.
pub fn compute_interpolated_positions_with_options<M, I, S>(
    hierarchy: &mut PatchHierarchy,
    source: &M,
    target: &M,
    t: f64,
    interpolator: &I,
    solver: &S,
    options: &ComposeOptions,
) -> Result<Vec<Point3<f64>>>
where
    M: SurfaceMesh + Sync,
    I: LeafInterpolator,
    S: MultiRegionSolver + ?Sized,
{
    if !(0.0..=1.0).contains(&t) {
        return Err(MorphError::invalid_param("t", t, "must lie in [0, 1]"));
    }
    check_meshes_match(source, target)?;
    if !hierarchy.is_annotated() {
        return Err(MorphError::NotAnnotated { node: PatchPath::root() });
    }
    let root_vertices = hierarchy.root().vertex_ids().len();
    if root_vertices != source.num_vertices() {
        return Err(MorphError::MeshMismatch {
            details: format!(
                "hierarchy covers {} vertices, meshes have {}",
                root_vertices,
                source.num_vertices()
            ),
        });
    }

    compose(hierarchy.root_mut(), source, target, t, interpolator, solver, options)?;

    hierarchy
        .root()
        .points()
        .map(<[Point3<f64>]>::to_vec)
        .ok_or(MorphError::NotAnnotated { node: PatchPath::root() })
}

/// Check that two meshes have the same vertex and face counts.
pub fn check_meshes_match<M: SurfaceMesh>(source: &M, target: &M) -> Result<()> {
    if source.num_vertices() != target.num_vertices() {
        return Err(MorphError::MeshMismatch {
            details: format!(
                "{} source vertices vs {} target vertices",
                source.num_vertices(),
                target.num_vertices()
            ),
        });
    }
    if source.num_faces() != target.num_faces() {
        return Err(MorphError::MeshMismatch {
            details: format!("{} source faces vs {} target faces", source.num_faces(), target.num_faces()),
        });
    }
    Ok(())
}
