//! End-to-end morphing scenarios.

use approx::assert_relative_eq;
use nalgebra::{Point3, Rotation3, Vector3};
use patchmorph::mesh::primitives::{grid, torus};
use patchmorph::morph::{
    LeafPatch, PairCorrespondence, PatchNode, PatchPath, SolverOptions,
};
use patchmorph::prelude::*;

/// Returns a fixed transform per child.
struct FixedFrames(Vec<RigidTransform>);

impl MultiRegionSolver for FixedFrames {
    fn solve(&self, branching: usize, _: &[PairCorrespondence]) -> Result<Vec<RigidTransform>> {
        assert_eq!(branching, self.0.len());
        Ok(self.0.clone())
    }
}

/// Lifts the left column by one and the right column by three, reporting
/// the right column in a rotated and shifted local frame.
struct LiftInterpolator {
    right_frame: RigidTransform,
}

impl LeafInterpolator for LiftInterpolator {
    fn interpolate<M: SurfaceMesh>(
        &self,
        _t: f64,
        leaf: &LeafPatch<'_>,
        source: &M,
        _target: &M,
    ) -> Result<Vec<Point3<f64>>> {
        let right = leaf.face_ids[0].index() % 4 >= 2;
        let to_local = self.right_frame.inverse();
        Ok(leaf
            .vertex_ids
            .iter()
            .map(|&v| {
                let lift = if right { 3.0 } else { 1.0 };
                let p = source.position(v) + Vector3::new(0.0, 0.0, lift);
                if right {
                    to_local.apply(&p)
                } else {
                    p
                }
            })
            .collect())
    }
}

#[test]
fn torus_hierarchy_meets_bounds() {
    let mesh = torus(20, 10, 2.0, 0.5).unwrap();
    assert_eq!(mesh.num_faces(), 400);

    for seed in 0..5 {
        let options = HierarchyOptions::default().with_seed(seed);
        let hierarchy = build_hierarchy(&mesh, &options).unwrap();
        assert!(hierarchy.stats().max_depth < 15);
        assert!(hierarchy.stats().attempts <= options.max_attempts);

        let mut leaves = 0;
        hierarchy.root().walk(|_, node| {
            if node.is_leaf() {
                leaves += 1;
                assert!(node.face_ids().len() <= 50);
            }
        });
        assert_eq!(leaves, hierarchy.stats().leaf_count);
    }
}

#[test]
fn shared_seam_is_averaged() {
    // Left and right cell columns of a 2x4 grid share the five vertices on x = 1.
    let mesh = grid(2, 4).unwrap();
    let left: Vec<FaceId> = (0..4).flat_map(|row| [row * 4, row * 4 + 1]).map(FaceId::new).collect();
    let right: Vec<FaceId> = (0..4).flat_map(|row| [row * 4 + 2, row * 4 + 3]).map(FaceId::new).collect();
    let root = PatchNode::with_children(vec![PatchNode::leaf(left, 2), PatchNode::leaf(right, 2)]);
    let mut hierarchy = PatchHierarchy::from_root(root);
    annotate_registration(&mut hierarchy, &mesh);

    let pairs = hierarchy.root().sibling_pairs();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].shared.len(), 5);

    let right_frame = RigidTransform::new(Rotation3::from_euler_angles(0.4, -0.2, 1.1), Vector3::new(5.0, -1.0, 2.0));
    let interpolator = LiftInterpolator { right_frame };
    let solver = FixedFrames(vec![RigidTransform::identity(), right_frame]);
    let points = compute_interpolated_positions(&mut hierarchy, &mesh, &mesh, 0.5, &interpolator, &solver).unwrap();

    for v in mesh.vertex_ids() {
        let p = mesh.positions()[v.index()];
        let expected = match p.x as i64 {
            0 => 1.0,
            1 => 2.0,
            _ => 3.0,
        };
        assert_relative_eq!(points[v.index()].x, p.x, epsilon = 1e-9);
        assert_relative_eq!(points[v.index()].y, p.y, epsilon = 1e-9);
        assert_relative_eq!(points[v.index()].z, expected, epsilon = 1e-9);
    }
}

#[test]
fn linear_endpoints_reproduce_meshes() {
    let source = torus(16, 8, 2.0, 0.5).unwrap();
    let target = torus(16, 8, 2.0, 0.9).unwrap();
    let options = HierarchyOptions::default().with_leaf_size(24).with_seed(12);
    let mut hierarchy = build_hierarchy(&source, &options).unwrap();
    annotate_registration(&mut hierarchy, &source);

    let solver = KabschSolver::new(SolverOptions::default());
    let start =
        compute_interpolated_positions(&mut hierarchy, &source, &target, 0.0, &LinearInterpolator, &solver).unwrap();
    for (p, s) in start.iter().zip(source.positions()) {
        assert_relative_eq!(*p, *s, epsilon = 1e-9);
    }

    let end =
        compute_interpolated_positions(&mut hierarchy, &source, &target, 1.0, &LinearInterpolator, &solver).unwrap();
    for (p, g) in end.iter().zip(target.positions()) {
        assert_relative_eq!(*p, *g, epsilon = 1e-9);
    }
}

#[test]
fn rigidly_moved_target_is_reached() {
    let source = torus(16, 8, 2.0, 0.5).unwrap();
    let motion = RigidTransform::new(Rotation3::from_euler_angles(0.3, 0.1, 0.7), Vector3::new(1.0, -2.0, 0.5));
    let moved: Vec<_> = source.positions().iter().map(|p| motion.apply(p)).collect();
    let target = source.with_positions(&moved).unwrap();

    let options = MorphOptions::default().with_hierarchy(HierarchyOptions::default().with_leaf_size(24).with_seed(4));
    let mut morpher = Morpher::new(source.clone(), target.clone(), &options).unwrap();

    // Each leaf lands on the target in its own frame; the root is the target
    // up to the rigid motion fixed by the anchor patches.
    let end = morpher.interpolate(1.0).unwrap();
    let fit = RigidTransform::best_fit(&end, target.positions());
    for (p, g) in end.iter().zip(target.positions()) {
        assert_relative_eq!(fit.apply(p), *g, epsilon = 1e-6);
    }

    let halfway = morpher.interpolate_mesh(0.5).unwrap();
    assert!(halfway.positions().iter().all(|p| p.iter().all(|x| x.is_finite())));
    assert!(halfway.same_connectivity(&source));
}

#[test]
fn composition_is_repeatable_across_blends() {
    let source = torus(12, 6, 2.0, 0.5).unwrap();
    let target = torus(12, 6, 3.0, 0.5).unwrap();
    let options = MorphOptions::default().with_hierarchy(HierarchyOptions::default().with_leaf_size(20).with_seed(8));
    let mut morpher = Morpher::new(source, target, &options).unwrap();

    let first = morpher.interpolate(0.3).unwrap();
    morpher.interpolate(0.9).unwrap();
    let again = morpher.interpolate(0.3).unwrap();
    assert_eq!(first, again);
}

#[test]
fn failures_name_the_patch() {
    struct Refuse;

    impl MultiRegionSolver for Refuse {
        fn solve(&self, _: usize, _: &[PairCorrespondence]) -> Result<Vec<RigidTransform>> {
            Err(MorphError::Registration("degenerate correspondences".into()))
        }
    }

    let mesh = grid(4, 4).unwrap();
    let options = HierarchyOptions::default().with_leaf_size(40).with_seed(1);
    let mut hierarchy = build_hierarchy(&mesh, &options).unwrap();
    annotate_registration(&mut hierarchy, &mesh);

    // 32 faces under a leaf size of 40: a single split below the root.
    assert_eq!(hierarchy.stats().max_depth, 2);
    let err = compute_interpolated_positions(&mut hierarchy, &mesh, &mesh, 0.5, &LinearInterpolator, &Refuse)
        .unwrap_err();
    match err {
        MorphError::Composition { node, source } => {
            assert_eq!(node, PatchPath::root());
            assert!(matches!(*source, MorphError::Registration(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
