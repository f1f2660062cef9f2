//! Region-growing patch hierarchy.
//!
//! A patch is split by picking K random seed faces and growing K regions
//! from them at once, breadth first, one ring per child per round, until
//! every face of the patch is owned. Faces where two regions meet are
//! duplicated into the neighbouring region according to an
//! [`OverlapPolicy`], so sibling patches overlap along their seams. Children
//! larger than the leaf size are split again.
//!
//! Splitting is randomized and can produce lopsided trees. The whole tree is
//! therefore rebuilt until its maximum leaf depth is below a bound, up to a
//! fixed number of attempts.
//!
//! # Example
//!
//! ```
//! use patchmorph::mesh::primitives::torus;
//! use patchmorph::morph::{build_hierarchy, HierarchyOptions};
//!
//! let mesh = torus(20, 10, 2.0, 0.5).unwrap();
//! let options = HierarchyOptions::default().with_seed(7);
//! let hierarchy = build_hierarchy(&mesh, &options).unwrap();
//!
//! assert!(hierarchy.stats().max_depth < options.depth_bound);
//! ```

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::patch::{HierarchyStats, PatchHierarchy, PatchNode};
use super::Progress;
use crate::error::{MorphError, Result};
use crate::mesh::{FaceId, SurfaceMesh};

/// What happens when a growing region runs into a face another region
/// already owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// The region that ran into the foreign face also takes it. A contested
    /// face ends up in its owner and in every region that bordered it.
    #[default]
    Discoverer,
    /// Both regions take each other's face across the contested edge.
    Mutual,
    /// Nothing is shared; children partition the patch exactly.
    Disjoint,
}

/// Options for hierarchy construction.
#[derive(Debug, Clone)]
pub struct HierarchyOptions {
    /// Number of children per split (K).
    pub branching: usize,

    /// Patches with at most this many faces are not split further.
    pub leaf_size: usize,

    /// A tree is accepted when its maximum leaf depth is below this bound.
    /// The root alone has depth 1.
    pub depth_bound: usize,

    /// Trees built before giving up.
    pub max_attempts: usize,

    /// How region boundaries are shared between siblings.
    pub overlap: OverlapPolicy,

    /// Seed for the random generator; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            branching: 4,
            leaf_size: 50,
            depth_bound: 15,
            max_attempts: 64,
            overlap: OverlapPolicy::Discoverer,
            seed: None,
        }
    }
}

impl HierarchyOptions {
    /// Set the branching factor.
    pub fn with_branching(mut self, branching: usize) -> Self {
        self.branching = branching;
        self
    }

    /// Set the leaf size.
    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    /// Set the depth bound.
    pub fn with_depth_bound(mut self, depth_bound: usize) -> Self {
        self.depth_bound = depth_bound;
        self
    }

    /// Set the number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the overlap policy.
    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Use a fixed random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// A generator seeded from [`seed`](Self::seed), or from the OS when unset.
    pub fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Check the options for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.branching < 2 {
            return Err(MorphError::invalid_param("branching", self.branching, "must be at least 2"));
        }
        if self.leaf_size < self.branching {
            return Err(MorphError::invalid_param(
                "leaf_size",
                self.leaf_size,
                "must be at least the branching factor",
            ));
        }
        if self.depth_bound < 3 {
            return Err(MorphError::invalid_param(
                "depth_bound",
                self.depth_bound,
                "must be at least 3 since the root is always split",
            ));
        }
        if self.max_attempts == 0 {
            return Err(MorphError::invalid_param("max_attempts", 0, "must be at least 1"));
        }
        Ok(())
    }
}

/// Build a patch hierarchy over every face of `mesh`.
///
/// The generator is seeded from [`HierarchyOptions::seed`], so a fixed seed
/// gives the same tree on every run.
pub fn build_hierarchy<M: SurfaceMesh>(mesh: &M, options: &HierarchyOptions) -> Result<PatchHierarchy> {
    build_hierarchy_with_progress(mesh, options, &mut options.rng(), &Progress::none())
}

/// Build a patch hierarchy drawing randomness from `rng`.
///
/// [`HierarchyOptions::seed`] is ignored.
pub fn build_hierarchy_with_rng<M, R>(mesh: &M, options: &HierarchyOptions, rng: &mut R) -> Result<PatchHierarchy>
where
    M: SurfaceMesh,
    R: Rng + ?Sized,
{
    build_hierarchy_with_progress(mesh, options, rng, &Progress::none())
}

/// Build a patch hierarchy, reporting each attempt to `progress`.
pub fn build_hierarchy_with_progress<M, R>(
    mesh: &M,
    options: &HierarchyOptions,
    rng: &mut R,
    progress: &Progress,
) -> Result<PatchHierarchy>
where
    M: SurfaceMesh,
    R: Rng + ?Sized,
{
    options.validate()?;

    let mut shallowest_rejected: Option<usize> = None;
    let mut last_stall: Option<usize> = None;

    for attempt in 1..=options.max_attempts {
        progress.report(attempt - 1, options.max_attempts, "Building patch hierarchy");

        let mut builder = TreeBuilder {
            mesh,
            options,
            rng: &mut *rng,
            min_patch_faces: usize::MAX,
        };
        let mut root = PatchNode::leaf(mesh.face_ids().collect(), options.branching);

        let depth = match builder.split(&mut root, 1) {
            Ok(()) => root.max_depth(),
            Err(Rejected::TooDeep) => options.depth_bound,
            Err(Rejected::Stalled { unreached }) => {
                log::warn!("attempt {}: region growing stalled, {} faces unreached", attempt, unreached);
                last_stall = Some(unreached);
                continue;
            }
            Err(Rejected::Failed(e)) => return Err(e),
        };

        if depth < options.depth_bound {
            let stats = HierarchyStats {
                attempts: attempt,
                min_patch_faces: builder.min_patch_faces,
                max_depth: depth,
                min_depth: root.min_depth(),
                leaf_count: root.leaf_count(),
                node_count: root.node_count(),
            };
            log::info!(
                "patch hierarchy accepted after {} attempt(s): depth {}..{}, {} leaves, smallest patch {} faces",
                attempt,
                stats.min_depth,
                stats.max_depth,
                stats.leaf_count,
                stats.min_patch_faces
            );
            progress.report(options.max_attempts, options.max_attempts, "Building patch hierarchy");
            return Ok(PatchHierarchy { root, stats });
        }

        log::debug!("attempt {}: depth {} not below {}, rebuilding", attempt, depth, options.depth_bound);
        shallowest_rejected = Some(shallowest_rejected.map_or(depth, |d| d.min(depth)));
    }

    match (shallowest_rejected, last_stall) {
        (None, Some(unreached)) => Err(MorphError::PatchDisconnected { unreached }),
        (shallowest, _) => Err(MorphError::HierarchyUnbalanced {
            attempts: options.max_attempts,
            depth_bound: options.depth_bound,
            shallowest: shallowest.unwrap_or(options.depth_bound),
        }),
    }
}

/// Why a single tree attempt was abandoned.
enum Rejected {
    TooDeep,
    Stalled { unreached: usize },
    Failed(MorphError),
}

impl From<MorphError> for Rejected {
    fn from(e: MorphError) -> Self {
        match e {
            MorphError::PatchDisconnected { unreached } => Rejected::Stalled { unreached },
            other => Rejected::Failed(other),
        }
    }
}

struct TreeBuilder<'a, M: ?Sized, R: ?Sized> {
    mesh: &'a M,
    options: &'a HierarchyOptions,
    rng: &'a mut R,
    min_patch_faces: usize,
}

impl<M: SurfaceMesh, R: Rng + ?Sized> TreeBuilder<'_, M, R> {
    /// Split `node`, which sits at depth `level`, and recurse into oversized
    /// children.
    fn split(&mut self, node: &mut PatchNode, level: usize) -> std::result::Result<(), Rejected> {
        // Children would sit at level + 1; such a tree can never be accepted.
        if level + 1 >= self.options.depth_bound {
            return Err(Rejected::TooDeep);
        }

        let children = split_patch(
            self.mesh,
            &node.face_ids,
            self.options.branching,
            self.options.overlap,
            &mut *self.rng,
        )?;

        if let Some(smallest) = children.iter().map(|c| c.face_ids.len()).min() {
            self.min_patch_faces = self.min_patch_faces.min(smallest);
        }
        node.children = children.into_iter().map(Some).collect();

        for child in node.children.iter_mut().flatten() {
            if child.face_ids.len() > self.options.leaf_size {
                self.split(child, level + 1)?;
            }
        }
        Ok(())
    }
}

/// Pick `count` distinct positions in `0..len` by rejection sampling.
///
/// Fails with [`MorphError::PatchTooSmall`] when `len < count`, which would
/// otherwise never terminate.
pub fn select_seeds<R: Rng + ?Sized>(len: usize, count: usize, rng: &mut R) -> Result<Vec<usize>> {
    if len < count {
        return Err(MorphError::PatchTooSmall {
            faces: len,
            branching: count,
        });
    }

    let mut chosen = Vec::with_capacity(count);
    while chosen.len() < count {
        let candidate = rng.gen_range(0..len);
        if !chosen.contains(&candidate) {
            chosen.push(candidate);
        }
    }
    Ok(chosen)
}

/// Split one patch into `branching` overlapping leaf children.
///
/// `face_ids` must be sorted. Every face of the patch ends up in at least
/// one child; a face in several children is always listed in the
/// boundary faces of all but its owner.
pub fn split_patch<M, R>(
    mesh: &M,
    face_ids: &[FaceId],
    branching: usize,
    overlap: OverlapPolicy,
    rng: &mut R,
) -> Result<Vec<PatchNode>>
where
    M: SurfaceMesh,
    R: Rng + ?Sized,
{
    let seeds = select_seeds(face_ids.len(), branching, rng)?;

    let position: HashMap<FaceId, usize> = face_ids.iter().enumerate().map(|(i, &f)| (f, i)).collect();
    let mut owner: Vec<Option<usize>> = vec![None; face_ids.len()];
    let mut regions: Vec<Vec<FaceId>> = vec![Vec::new(); branching];
    let mut contested: Vec<Vec<FaceId>> = vec![Vec::new(); branching];
    let mut scanned = vec![0usize; branching];

    for (child, &seed) in seeds.iter().enumerate() {
        regions[child].push(face_ids[seed]);
        owner[seed] = Some(child);
    }
    let mut unclaimed = face_ids.len() - branching;

    while unclaimed > 0 {
        let before = unclaimed;

        for child in 0..branching {
            let end = regions[child].len();
            for k in scanned[child]..end {
                let face = regions[child][k];
                for neighbor in mesh.adjacent_faces(face) {
                    let Some(&pos) = position.get(&neighbor) else {
                        continue;
                    };
                    match owner[pos] {
                        None => {
                            owner[pos] = Some(child);
                            regions[child].push(neighbor);
                            unclaimed -= 1;
                        }
                        Some(other) if other != child => match overlap {
                            OverlapPolicy::Discoverer => contested[child].push(neighbor),
                            OverlapPolicy::Mutual => {
                                contested[child].push(neighbor);
                                contested[other].push(face);
                            }
                            OverlapPolicy::Disjoint => {}
                        },
                        Some(_) => {}
                    }
                }
            }
            scanned[child] = end;
        }

        if unclaimed == before {
            return Err(MorphError::PatchDisconnected { unreached: unclaimed });
        }
    }

    let children = regions
        .into_iter()
        .zip(contested)
        .map(|(mut faces, mut boundary)| {
            boundary.sort_unstable();
            boundary.dedup();
            faces.extend_from_slice(&boundary);
            let mut node = PatchNode::leaf(faces, branching);
            node.boundary_face_ids = boundary;
            node
        })
        .collect();

    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::{grid, torus};
    use crate::mesh::{build_from_triangles, HalfEdgeMesh};
    use nalgebra::Point3;
    use std::collections::BTreeSet;

    fn all_faces(mesh: &HalfEdgeMesh) -> Vec<FaceId> {
        mesh.face_ids().collect()
    }

    fn check_split(parent: &[FaceId], children: &[PatchNode]) {
        // Coverage: the union of the children is the parent.
        let union: BTreeSet<FaceId> = children.iter().flat_map(|c| c.face_ids().iter().copied()).collect();
        let parent_set: BTreeSet<FaceId> = parent.iter().copied().collect();
        assert_eq!(union, parent_set);

        // Overlap consistency: a face owned by several children is a recorded
        // boundary face of at least one of them.
        for &face in parent {
            let holders: Vec<&PatchNode> = children.iter().filter(|c| c.face_ids().binary_search(&face).is_ok()).collect();
            if holders.len() > 1 {
                assert!(holders.iter().any(|c| c.boundary_face_ids().binary_search(&face).is_ok()));
            }
        }

        for child in children {
            assert!(child.face_ids().windows(2).all(|w| w[0] < w[1]), "faces must be sorted and unique");
        }
    }

    #[test]
    fn test_select_seeds_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let seeds = select_seeds(6, 6, &mut rng).unwrap();
            let unique: BTreeSet<_> = seeds.iter().collect();
            assert_eq!(unique.len(), 6);
            assert!(seeds.iter().all(|&s| s < 6));
        }
    }

    #[test]
    fn test_select_seeds_too_small() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = select_seeds(3, 4, &mut rng).unwrap_err();
        assert!(matches!(err, MorphError::PatchTooSmall { faces: 3, branching: 4 }));
    }

    #[test]
    fn test_split_patch_covers_parent() {
        let mesh = grid(8, 8).unwrap();
        let faces = all_faces(&mesh);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for policy in [OverlapPolicy::Discoverer, OverlapPolicy::Mutual, OverlapPolicy::Disjoint] {
            let children = split_patch(&mesh, &faces, 4, policy, &mut rng).unwrap();
            assert_eq!(children.len(), 4);
            assert!(children.iter().all(|c| c.is_leaf() && c.branching() == 4));
            check_split(&faces, &children);
        }
    }

    #[test]
    fn test_disjoint_policy_partitions() {
        let mesh = grid(6, 6).unwrap();
        let faces = all_faces(&mesh);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let children = split_patch(&mesh, &faces, 3, OverlapPolicy::Disjoint, &mut rng).unwrap();

        let total: usize = children.iter().map(|c| c.face_ids().len()).sum();
        assert_eq!(total, faces.len());
        assert!(children.iter().all(|c| c.boundary_face_ids().is_empty()));
    }

    #[test]
    fn test_discoverer_policy_overlaps() {
        let mesh = grid(6, 6).unwrap();
        let faces = all_faces(&mesh);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let children = split_patch(&mesh, &faces, 3, OverlapPolicy::Discoverer, &mut rng).unwrap();

        let total: usize = children.iter().map(|c| c.face_ids().len()).sum();
        assert!(total > faces.len(), "adjacent regions must share seam faces");
        for child in &children {
            // A child never lists its own grown faces as boundary twice.
            let unique: BTreeSet<_> = child.boundary_face_ids().iter().collect();
            assert_eq!(unique.len(), child.boundary_face_ids().len());
        }
    }

    #[test]
    fn test_split_subpatch_ignores_outside_faces() {
        let mesh = grid(6, 6).unwrap();
        // Bottom three rows only.
        let faces: Vec<FaceId> = (0..36).map(FaceId::new).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let children = split_patch(&mesh, &faces, 2, OverlapPolicy::Discoverer, &mut rng).unwrap();
        check_split(&faces, &children);
    }

    #[test]
    fn test_split_disconnected_stalls() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
            Point3::new(9.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(9.0, 1.0, 0.0),
        ];
        // Three isolated triangles, two seeds: one is always unreachable.
        let mesh = build_from_triangles(&vertices, &[[0, 1, 2], [3, 4, 5], [6, 7, 8]]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let err = split_patch(&mesh, &all_faces(&mesh), 2, OverlapPolicy::Discoverer, &mut rng).unwrap_err();
        assert!(matches!(err, MorphError::PatchDisconnected { unreached: 1 }));

        let options = HierarchyOptions::default().with_branching(2).with_leaf_size(2).with_max_attempts(3).with_seed(0);
        let err = build_hierarchy(&mesh, &options).unwrap_err();
        assert!(matches!(err, MorphError::PatchDisconnected { .. }));
    }

    #[test]
    fn test_hierarchy_respects_leaf_size_and_depth() {
        let mesh = torus(20, 10, 2.0, 0.5).unwrap();
        let options = HierarchyOptions::default().with_seed(42);
        let hierarchy = build_hierarchy(&mesh, &options).unwrap();

        let root = hierarchy.root();
        assert_eq!(root.face_ids().len(), 400);
        assert!(!root.is_leaf());
        assert!(hierarchy.stats().max_depth < 15);
        assert!(hierarchy.stats().attempts >= 1);

        root.walk(|_, node| {
            if node.is_leaf() {
                assert!(node.face_ids().len() <= options.leaf_size);
            } else {
                assert!(node.children().count() == options.branching);
                let children: Vec<PatchNode> = node.children().cloned().collect();
                check_split(node.face_ids(), &children);
            }
        });
    }

    #[test]
    fn test_hierarchy_is_deterministic_for_seed() {
        let mesh = torus(16, 8, 2.0, 0.5).unwrap();
        let options = HierarchyOptions::default().with_leaf_size(20).with_seed(99);

        let a = build_hierarchy(&mesh, &options).unwrap();
        let b = build_hierarchy(&mesh, &options).unwrap();

        let mut faces_a = Vec::new();
        let mut faces_b = Vec::new();
        a.root().walk(|path, node| faces_a.push((path.clone(), node.face_ids().to_vec())));
        b.root().walk(|path, node| faces_b.push((path.clone(), node.face_ids().to_vec())));
        assert_eq!(faces_a, faces_b);
        assert_eq!(a.stats(), b.stats());
    }

    #[test]
    fn test_options_rng_follows_seed() {
        let seeded = HierarchyOptions::default().with_seed(42);
        let a: u64 = seeded.rng().gen();
        let b: u64 = seeded.rng().gen();
        assert_eq!(a, b);
        assert_eq!(a, ChaCha8Rng::seed_from_u64(42).gen::<u64>());

        let other: u64 = HierarchyOptions::default().with_seed(43).rng().gen();
        assert_ne!(a, other);
    }

    #[test]
    fn test_hierarchy_unbalanced_after_budget() {
        let mesh = torus(20, 10, 2.0, 0.5).unwrap();
        // 400 faces cannot reach 4-face leaves within depth 3.
        let options = HierarchyOptions::default()
            .with_leaf_size(4)
            .with_depth_bound(3)
            .with_max_attempts(5)
            .with_seed(1);
        let err = build_hierarchy(&mesh, &options).unwrap_err();
        assert!(matches!(
            err,
            MorphError::HierarchyUnbalanced { attempts: 5, depth_bound: 3, shallowest: 3 }
        ));
    }

    #[test]
    fn test_hierarchy_too_few_faces() {
        let mesh = grid(1, 1).unwrap();
        let options = HierarchyOptions::default().with_seed(0);
        let err = build_hierarchy(&mesh, &options).unwrap_err();
        assert!(matches!(err, MorphError::PatchTooSmall { faces: 2, branching: 4 }));
    }

    #[test]
    fn test_small_patch_still_splits() {
        // Root below the leaf size is split anyway.
        let mesh = grid(2, 2).unwrap();
        let options = HierarchyOptions::default().with_branching(2).with_seed(4);
        let hierarchy = build_hierarchy(&mesh, &options).unwrap();
        assert_eq!(hierarchy.stats().max_depth, 2);
        assert_eq!(hierarchy.root().children().count(), 2);
    }

    #[test]
    fn test_options_validation() {
        assert!(HierarchyOptions::default().validate().is_ok());
        assert!(HierarchyOptions::default().with_branching(1).validate().is_err());
        assert!(HierarchyOptions::default().with_leaf_size(3).validate().is_err());
        assert!(HierarchyOptions::default().with_depth_bound(2).validate().is_err());
        assert!(HierarchyOptions::default().with_max_attempts(0).validate().is_err());
    }

    #[test]
    fn test_progress_reports_attempts() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let progress = Progress::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let mesh = grid(4, 4).unwrap();
        let options = HierarchyOptions::default().with_leaf_size(8);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        build_hierarchy_with_progress(&mesh, &options, &mut rng, &progress).unwrap();
        assert!(calls.load(Ordering::Relaxed) >= 2);
    }
}
