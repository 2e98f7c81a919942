//! Depth-first node lookup over a unit forest.
//!
//! # Invariants
//! - Traversal is pre-order: a node is checked before its children, children
//!   in order before the next sibling.
//! - Lookups use an explicit stack; forest depth is bounded by memory only.
//! - Lookups never mutate the forest.

use crate::model::node::CurriculumNode;
use std::collections::HashSet;

/// Index path from the forest root sequence down to one node.
///
/// `path[0]` indexes the forest, every following entry indexes `children`.
pub type NodePath = Vec<usize>;

/// Returns the first node in pre-order whose id equals `target_id`.
pub fn find<'a>(forest: &'a [CurriculumNode], target_id: &str) -> Option<&'a CurriculumNode> {
    let mut stack: Vec<&CurriculumNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.id == target_id {
            return Some(node);
        }
        stack.extend(node.children.iter().rev());
    }
    None
}

/// Mutable variant of [`find`].
pub fn find_mut<'a>(
    forest: &'a mut [CurriculumNode],
    target_id: &str,
) -> Option<&'a mut CurriculumNode> {
    let path = locate(forest, target_id)?;
    node_at_mut(forest, &path)
}

/// Returns the index path of the first pre-order match.
///
/// Keeps one shared path that is truncated to each popped node's depth, so
/// memory stays proportional to the stack plus the tree depth.
pub fn locate(forest: &[CurriculumNode], target_id: &str) -> Option<NodePath> {
    let mut stack: Vec<(usize, usize, &CurriculumNode)> = forest
        .iter()
        .enumerate()
        .rev()
        .map(|(index, node)| (0, index, node))
        .collect();
    let mut path: NodePath = Vec::new();

    while let Some((depth, index, node)) = stack.pop() {
        // Pre-order: the entries left above `depth` are exactly this node's ancestors.
        path.truncate(depth);
        path.push(index);
        if node.id == target_id {
            return Some(path);
        }
        stack.extend(
            node.children
                .iter()
                .enumerate()
                .rev()
                .map(|(child_index, child)| (depth + 1, child_index, child)),
        );
    }
    None
}

/// Resolves an index path to a node.
pub fn node_at<'a>(forest: &'a [CurriculumNode], path: &[usize]) -> Option<&'a CurriculumNode> {
    let (first, rest) = path.split_first()?;
    let mut node = forest.get(*first)?;
    for index in rest {
        node = node.children.get(*index)?;
    }
    Some(node)
}

/// Resolves an index path to a mutable node.
pub fn node_at_mut<'a>(
    forest: &'a mut [CurriculumNode],
    path: &[usize],
) -> Option<&'a mut CurriculumNode> {
    let (first, rest) = path.split_first()?;
    let mut node = forest.get_mut(*first)?;
    for index in rest {
        node = node.children.get_mut(*index)?;
    }
    Some(node)
}

/// Counts every node reachable from the forest.
pub fn count_nodes(forest: &[CurriculumNode]) -> usize {
    let mut stack: Vec<&CurriculumNode> = forest.iter().collect();
    let mut count = 0;
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

/// Collects node ids in pre-order.
pub fn collect_ids(forest: &[CurriculumNode]) -> Vec<&str> {
    let mut stack: Vec<&CurriculumNode> = forest.iter().rev().collect();
    let mut ids = Vec::new();
    while let Some(node) = stack.pop() {
        ids.push(node.id.as_str());
        stack.extend(node.children.iter().rev());
    }
    ids
}

/// Returns the first id (in pre-order) that already appeared earlier.
pub fn first_duplicate_id(forest: &[CurriculumNode]) -> Option<&str> {
    let mut seen = HashSet::new();
    collect_ids(forest).into_iter().find(|id| !seen.insert(*id))
}
