//! The patch tree shared by hierarchy building, registration and composition.
//!
//! A [`PatchNode`] is a set of faces with exactly K child slots. Slots are
//! either all empty (a leaf) or all filled after a split. Nodes own their
//! children, so dropping a node releases its whole subtree.

use std::collections::HashMap;
use std::fmt;

use nalgebra::Point3;

use crate::mesh::{FaceId, VertexId};

/// Two sibling patches and the vertices they share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingPair {
    /// Index of the first child, always smaller than `second`.
    pub first: usize,
    /// Index of the second child.
    pub second: usize,
    /// Shared vertex ids, sorted ascending, never empty.
    pub shared: Vec<VertexId>,
}

/// Location of a node in the tree as the child indices taken from the root.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct PatchPath(Vec<usize>);

impl PatchPath {
    /// The root path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// The path of the `index`-th child of this node.
    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    /// Number of steps from the root.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Child indices from the root down.
    pub fn steps(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root")?;
        for step in &self.0 {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// One patch of the hierarchy.
#[derive(Debug, Clone, Default)]
pub struct PatchNode {
    pub(crate) face_ids: Vec<FaceId>,
    pub(crate) boundary_face_ids: Vec<FaceId>,
    pub(crate) children: Vec<Option<PatchNode>>,
    pub(crate) vertex_ids: Vec<VertexId>,
    pub(crate) vertex_index: HashMap<VertexId, usize>,
    pub(crate) sibling_pairs: Vec<SiblingPair>,
    pub(crate) points: Option<Vec<Point3<f64>>>,
}

impl PatchNode {
    /// Create a leaf with `branching` empty child slots.
    ///
    /// Face ids are sorted and deduplicated.
    pub fn leaf(mut face_ids: Vec<FaceId>, branching: usize) -> Self {
        face_ids.sort_unstable();
        face_ids.dedup();
        Self {
            face_ids,
            children: (0..branching).map(|_| None).collect(),
            ..Self::default()
        }
    }

    /// Create an internal node whose slots hold `children`.
    ///
    /// The node's faces are the union of the children's faces.
    pub fn with_children(children: Vec<PatchNode>) -> Self {
        let mut face_ids: Vec<FaceId> = children
            .iter()
            .flat_map(|c| c.face_ids.iter().copied())
            .collect();
        face_ids.sort_unstable();
        face_ids.dedup();
        Self {
            face_ids,
            children: children.into_iter().map(Some).collect(),
            ..Self::default()
        }
    }

    /// Faces of this patch, sorted ascending.
    pub fn face_ids(&self) -> &[FaceId] {
        &self.face_ids
    }

    /// Faces added to this patch because they border a sibling.
    pub fn boundary_face_ids(&self) -> &[FaceId] {
        &self.boundary_face_ids
    }

    /// Number of child slots (the branching factor).
    pub fn branching(&self) -> usize {
        self.children.len()
    }

    /// A node is a leaf when none of its slots holds a child.
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// The child in slot `index`, if any.
    pub fn child(&self, index: usize) -> Option<&PatchNode> {
        self.children.get(index).and_then(Option::as_ref)
    }

    /// Iterate over filled child slots.
    pub fn children(&self) -> impl Iterator<Item = &PatchNode> + '_ {
        self.children.iter().flatten()
    }

    /// Vertices covered by this patch, set by registration.
    pub fn vertex_ids(&self) -> &[VertexId] {
        &self.vertex_ids
    }

    /// Position of `vertex` in [`PatchNode::vertex_ids`].
    pub fn index_of(&self, vertex: VertexId) -> Option<usize> {
        self.vertex_index.get(&vertex).copied()
    }

    /// Sibling pairs among this node's children.
    pub fn sibling_pairs(&self) -> &[SiblingPair] {
        &self.sibling_pairs
    }

    /// Composed positions, one per vertex id.
    pub fn points(&self) -> Option<&[Point3<f64>]> {
        self.points.as_deref()
    }

    /// Replace the vertex ids and rebuild the inverse index.
    pub(crate) fn set_vertex_ids(&mut self, vertex_ids: Vec<VertexId>) {
        self.vertex_index = vertex_ids.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        self.vertex_ids = vertex_ids;
    }

    /// Height of the subtree; a lone leaf has depth 1.
    pub fn max_depth(&self) -> usize {
        1 + self.children().map(PatchNode::max_depth).max().unwrap_or(0)
    }

    /// Length of the shortest root-to-leaf path; a lone leaf has depth 1.
    pub fn min_depth(&self) -> usize {
        1 + self.children().map(PatchNode::min_depth).min().unwrap_or(0)
    }

    /// Number of nodes in the subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children().map(PatchNode::node_count).sum::<usize>()
    }

    /// Number of leaves in the subtree.
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children().map(PatchNode::leaf_count).sum()
        }
    }

    /// Visit every node in pre-order together with its path.
    pub fn walk<F: FnMut(&PatchPath, &PatchNode)>(&self, mut visit: F) {
        self.walk_from(&PatchPath::root(), &mut visit);
    }

    fn walk_from<F: FnMut(&PatchPath, &PatchNode)>(&self, path: &PatchPath, visit: &mut F) {
        visit(path, self);
        for (i, slot) in self.children.iter().enumerate() {
            if let Some(child) = slot {
                child.walk_from(&path.child(i), visit);
            }
        }
    }
}

/// Diagnostics gathered while building a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HierarchyStats {
    /// Attempts made, the accepted one included.
    pub attempts: usize,
    /// Smallest child patch produced by any split of the accepted tree.
    pub min_patch_faces: usize,
    /// Maximum leaf depth of the accepted tree.
    pub max_depth: usize,
    /// Minimum leaf depth of the accepted tree.
    pub min_depth: usize,
    /// Number of leaves.
    pub leaf_count: usize,
    /// Number of nodes.
    pub node_count: usize,
}

/// An owned patch tree with a fixed branching factor.
#[derive(Debug, Clone)]
pub struct PatchHierarchy {
    pub(crate) root: PatchNode,
    pub(crate) stats: HierarchyStats,
}

impl PatchHierarchy {
    /// Wrap a tree built elsewhere. Statistics are computed from the tree.
    pub fn from_root(root: PatchNode) -> Self {
        let stats = HierarchyStats {
            attempts: 0,
            min_patch_faces: min_child_faces(&root).unwrap_or(root.face_ids.len()),
            max_depth: root.max_depth(),
            min_depth: root.min_depth(),
            leaf_count: root.leaf_count(),
            node_count: root.node_count(),
        };
        Self { root, stats }
    }

    /// The root patch.
    pub fn root(&self) -> &PatchNode {
        &self.root
    }

    /// Mutable access to the root patch.
    pub fn root_mut(&mut self) -> &mut PatchNode {
        &mut self.root
    }

    /// The branching factor.
    pub fn branching(&self) -> usize {
        self.root.branching()
    }

    /// Build diagnostics.
    pub fn stats(&self) -> &HierarchyStats {
        &self.stats
    }

    /// True once registration has assigned vertices to the root.
    pub fn is_annotated(&self) -> bool {
        !self.root.vertex_ids.is_empty()
    }
}

fn min_child_faces(node: &PatchNode) -> Option<usize> {
    node.children()
        .map(|c| c.face_ids.len())
        .chain(node.children().filter_map(min_child_faces))
        .min()
}
