//! Multi-region rigid alignment of sibling patches.
//!
//! [`KabschSolver`] places the children of one node in a common frame. Child
//! 0 is the anchor and keeps the identity. The pair graph is then walked
//! breadth first; each newly reached child is fitted onto every already
//! placed neighbour through their shared points. A few rounds of
//! block-coordinate refinement afterwards refit each non-anchor child against
//! all of its neighbours at once.

use std::collections::VecDeque;

use nalgebra::Point3;

use super::compose::{MultiRegionSolver, PairCorrespondence};
use super::transform::RigidTransform;
use crate::error::{MorphError, Result};

/// Options for [`KabschSolver`].
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Refinement sweeps after the breadth-first placement.
    pub refine_iterations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self { refine_iterations: 2 }
    }
}

impl SolverOptions {
    /// Set the number of refinement sweeps.
    pub fn with_refine_iterations(mut self, refine_iterations: usize) -> Self {
        self.refine_iterations = refine_iterations;
        self
    }
}

/// Aligns siblings by chaining least-squares rigid fits over the pair graph.
#[derive(Debug, Clone, Default)]
pub struct KabschSolver {
    options: SolverOptions,
}

impl KabschSolver {
    /// Create a solver with the given options.
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    /// The solver options.
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }
}

/// Correspondences of one child against a neighbour, oriented from the child.
struct Link<'a> {
    neighbor: usize,
    pair: &'a PairCorrespondence,
    child_is_first: bool,
}

impl Link<'_> {
    /// Points in the child's frame and the neighbour's current world points.
    fn collect(&self, transforms: &[RigidTransform], local: &mut Vec<Point3<f64>>, world: &mut Vec<Point3<f64>>) {
        let neighbor = &transforms[self.neighbor];
        for (a, b) in &self.pair.pairs {
            let (mine, theirs) = if self.child_is_first { (a, b) } else { (b, a) };
            local.push(*mine);
            world.push(neighbor.apply(theirs));
        }
    }
}

impl MultiRegionSolver for KabschSolver {
    fn solve(&self, branching: usize, pairs: &[PairCorrespondence]) -> Result<Vec<RigidTransform>> {
        let mut links: Vec<Vec<Link<'_>>> = (0..branching).map(|_| Vec::new()).collect();
        for pair in pairs {
            if pair.first >= branching || pair.second >= branching || pair.first == pair.second {
                return Err(MorphError::Registration(format!(
                    "pair ({}, {}) is not a sibling pair among {} children",
                    pair.first, pair.second, branching
                )));
            }
            if pair.pairs.is_empty() {
                continue;
            }
            links[pair.first].push(Link {
                neighbor: pair.second,
                pair,
                child_is_first: true,
            });
            links[pair.second].push(Link {
                neighbor: pair.first,
                pair,
                child_is_first: false,
            });
        }

        if branching > 1 && links.iter().all(Vec::is_empty) {
            return Err(MorphError::Registration("no correspondences between siblings".into()));
        }

        let mut transforms = vec![RigidTransform::identity(); branching];
        let mut placed = vec![false; branching];
        let mut anchors = vec![false; branching];
        let mut local = Vec::new();
        let mut world = Vec::new();

        for start in 0..branching {
            if placed[start] {
                continue;
            }
            if start > 0 {
                log::debug!("child {} is not linked to child 0, anchoring it separately", start);
            }
            placed[start] = true;
            anchors[start] = true;

            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for link in &links[current] {
                    let child = link.neighbor;
                    if placed[child] {
                        continue;
                    }
                    local.clear();
                    world.clear();
                    for back in links[child].iter().filter(|l| placed[l.neighbor]) {
                        back.collect(&transforms, &mut local, &mut world);
                    }
                    transforms[child] = RigidTransform::best_fit(&local, &world);
                    placed[child] = true;
                    queue.push_back(child);
                }
            }
        }

        for _ in 0..self.options.refine_iterations {
            for child in 0..branching {
                if anchors[child] || links[child].is_empty() {
                    continue;
                }
                local.clear();
                world.clear();
                for link in &links[child] {
                    link.collect(&transforms, &mut local, &mut world);
                }
                transforms[child] = RigidTransform::best_fit(&local, &world);
            }
        }

        Ok(transforms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector3};

    fn corr(first: usize, second: usize, a: &[Point3<f64>], to_b: &RigidTransform) -> PairCorrespondence {
        PairCorrespondence {
            first,
            second,
            pairs: a.iter().map(|p| (*p, to_b.apply(p))).collect(),
        }
    }

    fn cloud(offset: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(offset, 0.0, 0.0),
            Point3::new(offset + 1.0, 0.0, 0.0),
            Point3::new(offset, 1.0, 0.5),
            Point3::new(offset, 0.3, 1.0),
        ]
    }

    #[test]
    fn test_recovers_sibling_frames() {
        // Child 1 lives in a frame moved by `m1`, child 2 by `m2`, relative to child 0.
        let m1 = RigidTransform::new(Rotation3::from_euler_angles(0.1, 0.2, 0.3), Vector3::new(1.0, 0.0, 0.0));
        let m2 = RigidTransform::new(Rotation3::from_euler_angles(-0.4, 0.0, 0.2), Vector3::new(0.0, 2.0, -1.0));
        let shared01 = cloud(0.0);
        let shared12 = cloud(5.0);
        let pairs = vec![
            corr(0, 1, &shared01, &m1),
            corr(1, 2, &shared12.iter().map(|p| m1.apply(p)).collect::<Vec<_>>(), &m1.inverse().then(&m2)),
        ];

        let transforms = KabschSolver::default().solve(3, &pairs).unwrap();
        assert_eq!(transforms[0], RigidTransform::identity());
        for p in &shared01 {
            assert_relative_eq!(transforms[1].apply(&m1.apply(p)), *p, epsilon = 1e-9);
        }
        for p in &shared12 {
            assert_relative_eq!(transforms[2].apply(&m2.apply(p)), *p, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_disconnected_child_gets_own_anchor() {
        let m1 = RigidTransform::from_translation(Vector3::new(0.0, 0.0, 3.0));
        let pairs = vec![corr(0, 1, &cloud(0.0), &m1)];
        let transforms = KabschSolver::default().solve(3, &pairs).unwrap();
        assert_eq!(transforms.len(), 3);
        assert_eq!(transforms[2], RigidTransform::identity());
        assert_relative_eq!(transforms[1].translation, Vector3::new(0.0, 0.0, -3.0), epsilon = 1e-9);
    }

    #[test]
    fn test_no_correspondences_is_an_error() {
        let err = KabschSolver::default().solve(2, &[]).unwrap_err();
        assert!(matches!(err, MorphError::Registration(_)));
    }

    #[test]
    fn test_out_of_range_pair_is_an_error() {
        let pairs = vec![corr(0, 4, &cloud(0.0), &RigidTransform::identity())];
        assert!(KabschSolver::default().solve(2, &pairs).is_err());
    }

    #[test]
    fn test_refinement_keeps_consistent_solution() {
        let m1 = RigidTransform::new(Rotation3::from_euler_angles(0.0, 0.0, 0.5), Vector3::new(0.5, 0.5, 0.0));
        let pairs = vec![corr(0, 1, &cloud(0.0), &m1)];
        let solver = KabschSolver::new(SolverOptions::default().with_refine_iterations(5));
        let transforms = solver.solve(2, &pairs).unwrap();
        for p in cloud(0.0) {
            assert_relative_eq!(transforms[1].apply(&m1.apply(&p)), p, epsilon = 1e-9);
        }
    }
}
