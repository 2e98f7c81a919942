//! Structural edits on a unit forest.
//!
//! # Invariants
//! - Every operation either applies completely or leaves the forest untouched.
//! - Node ids stay unique: append/insert reject ids already in the forest.
//! - Delete never drops descendants; they take the deleted node's slot.

use crate::model::node::{CurriculumNode, Forest};
use crate::tree::locate::{collect_ids, first_duplicate_id, locate, node_at_mut};
use crate::tree::{TreeError, TreeResult};
use std::collections::HashSet;

/// Appends `new_node` as the last child of `target_id`.
pub fn append(forest: &mut Forest, target_id: &str, new_node: CurriculumNode) -> TreeResult<()> {
    let path =
        locate(forest, target_id).ok_or_else(|| TreeError::TargetNotFound(target_id.to_string()))?;
    ensure_subtree_ids_absent(forest, &new_node)?;

    let target = node_at_mut(forest, &path)
        .ok_or_else(|| TreeError::TargetNotFound(target_id.to_string()))?;
    target.children.push(new_node);
    Ok(())
}

/// Interposes `new_node` between `target_id` and the target's current children.
///
/// The target's children move under `new_node` (replacing whatever children
/// `new_node` carried) and the target is left with `[new_node]`.
pub fn insert(
    forest: &mut Forest,
    target_id: &str,
    mut new_node: CurriculumNode,
) -> TreeResult<()> {
    let path =
        locate(forest, target_id).ok_or_else(|| TreeError::TargetNotFound(target_id.to_string()))?;
    if collect_ids(forest).contains(&new_node.id.as_str()) {
        return Err(TreeError::DuplicateNodeId(new_node.id));
    }

    let target = node_at_mut(forest, &path)
        .ok_or_else(|| TreeError::TargetNotFound(target_id.to_string()))?;
    new_node.children = std::mem::take(&mut target.children);
    target.children = vec![new_node];
    Ok(())
}

/// Deletes `node_id` and splices its children into the slot it occupied.
///
/// Deleting a root promotes its children to roots at the same position.
/// Returns the removed node with an emptied children list.
pub fn delete(forest: &mut Forest, node_id: &str) -> TreeResult<CurriculumNode> {
    let path = locate(forest, node_id).ok_or_else(|| TreeError::NodeNotFound(node_id.to_string()))?;
    let (index, parent_path) = path
        .split_last()
        .ok_or_else(|| TreeError::NodeNotFound(node_id.to_string()))?;

    let siblings: &mut Vec<CurriculumNode> = if parent_path.is_empty() {
        forest
    } else {
        &mut node_at_mut(forest, parent_path)
            .ok_or_else(|| TreeError::NodeNotFound(node_id.to_string()))?
            .children
    };

    let mut removed = siblings.remove(*index);
    let tail = siblings.split_off(*index);
    siblings.append(&mut removed.children);
    siblings.extend(tail);
    Ok(removed)
}

/// Rejects forests that reuse a node id.
pub fn validate_forest(forest: &[CurriculumNode]) -> TreeResult<()> {
    match first_duplicate_id(forest) {
        Some(id) => Err(TreeError::DuplicateNodeId(id.to_string())),
        None => Ok(()),
    }
}

fn ensure_subtree_ids_absent(forest: &[CurriculumNode], subtree: &CurriculumNode) -> TreeResult<()> {
    let mut existing: HashSet<&str> = collect_ids(forest).into_iter().collect();
    for id in collect_ids(std::slice::from_ref(subtree)) {
        if !existing.insert(id) {
            return Err(TreeError::DuplicateNodeId(id.to_string()));
        }
    }
    Ok(())
}
