//! Vertex sets and sibling pair graphs.
//!
//! Registration walks a finished hierarchy top-down. Each child is given the
//! sorted set of vertices bounding its faces, and each internal node records
//! which pairs of its children share vertices. Composition later uses the
//! shared vertices as correspondences when aligning siblings.

use std::collections::BTreeSet;

use super::patch::{PatchHierarchy, PatchNode, SiblingPair};
use crate::mesh::{SurfaceMesh, VertexId};

/// Annotate every node of `hierarchy` with vertex ids and sibling pairs.
///
/// The root receives every mesh vertex in mesh order. Running this again,
/// for example after swapping in another mesh with the same connectivity,
/// replaces all previous annotations.
pub fn annotate_registration<M: SurfaceMesh>(hierarchy: &mut PatchHierarchy, mesh: &M) {
    let root = hierarchy.root_mut();
    root.set_vertex_ids(mesh.vertex_ids().collect());
    annotate_node(root, mesh);

    log::debug!(
        "registered {} vertices over {} patches",
        hierarchy.root().vertex_ids().len(),
        hierarchy.stats().node_count
    );
}

/// Annotate the children of `node` and recurse.
///
/// `node` itself must already carry its vertex ids.
pub fn annotate_node<M: SurfaceMesh>(node: &mut PatchNode, mesh: &M) {
    node.sibling_pairs.clear();
    if node.is_leaf() {
        return;
    }

    for child in node.children.iter_mut().flatten() {
        let vertices: BTreeSet<VertexId> = child
            .face_ids
            .iter()
            .flat_map(|&face| mesh.face_vertices(face))
            .collect();
        child.set_vertex_ids(vertices.into_iter().collect());
    }

    let slots = &node.children;
    let mut pairs = Vec::new();
    for i in 0..slots.len() {
        for j in (i + 1)..slots.len() {
            let (Some(a), Some(b)) = (&slots[i], &slots[j]) else {
                continue;
            };
            let shared = sorted_intersection(&a.vertex_ids, &b.vertex_ids);
            if !shared.is_empty() {
                pairs.push(SiblingPair {
                    first: i,
                    second: j,
                    shared,
                });
            }
        }
    }
    node.sibling_pairs = pairs;

    for child in node.children.iter_mut().flatten() {
        annotate_node(child, mesh);
    }
}

/// Intersection of two ascending slices by a linear merge.
pub fn sorted_intersection<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
