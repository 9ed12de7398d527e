//! Nested-set maintainer.
//!
//! Every function here runs inside an open [`GeoNodeTx`] that already holds
//! the forest lock. They validate first and only then shift intervals, so a
//! rejected request leaves the transaction untouched. Bounds stay contiguous
//! (`1..=2n`) across inserts, moves and deletes.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use crate::features::geodirectory::error::GeoError;
use crate::features::geodirectory::models::{GeoNode, NewGeoNode, NodePosition, RebuildSummary};
use crate::features::geodirectory::services::type_constraints::check_placement;
use crate::features::geodirectory::store::GeoNodeTx;

/// Insert a leaf under `parent_id`, or as the last root when `None`
pub async fn insert_node(
    tx: &mut dyn GeoNodeTx,
    new: NewGeoNode,
    parent_id: Option<Uuid>,
) -> Result<GeoNode, GeoError> {
    let parent = match parent_id {
        Some(pid) => Some(
            tx.find_by_id(pid)
                .await?
                .ok_or(GeoError::ParentNotFound(pid))?,
        ),
        None => None,
    };
    check_placement(new.node_type, parent.as_ref().map(|p| p.node_type))?;

    let ordering = tx.max_child_ordering(parent_id).await?.unwrap_or(0) + 1;

    let (lft, depth) = match &parent {
        Some(parent) => {
            tx.shift_bounds(parent.rgt, 2).await?;
            (parent.rgt, parent.depth + 1)
        }
        None => (tx.max_root_rgt().await?.unwrap_or(0) + 1, 0),
    };

    let now = Utc::now();
    let node = GeoNode {
        id: Uuid::now_v7(),
        name: new.name,
        node_type: new.node_type,
        code: new.code,
        postal_code: new.postal_code,
        latitude: new.latitude,
        longitude: new.longitude,
        parent_id,
        lft,
        rgt: lft + 1,
        depth,
        ordering,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&node).await?;

    tracing::debug!(node_id = %node.id, lft, depth, "Inserted geo node");
    Ok(node)
}

/// Re-attach the subtree rooted at `node_id` as the last child of
/// `new_parent_id` (or as the last root when `None`).
///
/// The subtree is first parked in non-positive bound space, the gap it left
/// is closed, a gap of the same width is opened at the target, and the parked
/// rows are shifted into it with their depths adjusted.
pub async fn move_subtree(
    tx: &mut dyn GeoNodeTx,
    node_id: Uuid,
    new_parent_id: Option<Uuid>,
) -> Result<GeoNode, GeoError> {
    let node = tx
        .find_by_id(node_id)
        .await?
        .ok_or(GeoError::NotFound(node_id))?;

    let target = match new_parent_id {
        Some(pid) => {
            let target = tx.find_by_id(pid).await?.ok_or(GeoError::NotFound(pid))?;
            if target.id == node.id || node.contains(&target) {
                return Err(GeoError::Cycle {
                    node_id,
                    target_id: pid,
                });
            }
            Some(target)
        }
        None => None,
    };
    check_placement(node.node_type, target.as_ref().map(|t| t.node_type))?;

    if node.parent_id == new_parent_id {
        return Ok(node);
    }

    let width = node.width();
    let depth_delta = target.as_ref().map_or(0, |t| t.depth + 1) - node.depth;

    // park: subtree now occupies [lft - rgt, 0]
    tx.shift_range(node.lft, node.rgt, -node.rgt, 0).await?;
    tx.shift_bounds(node.rgt + 1, -width).await?;

    let insert_at = match &target {
        Some(target) => {
            let target = tx
                .find_by_id(target.id)
                .await?
                .ok_or(GeoError::NotFound(target.id))?;
            tx.shift_bounds(target.rgt, width).await?;
            target.rgt
        }
        None => tx.max_root_rgt().await?.unwrap_or(0) + 1,
    };

    tx.shift_range(
        node.lft - node.rgt,
        0,
        node.rgt + insert_at - node.lft,
        depth_delta,
    )
    .await?;

    let ordering = tx.max_child_ordering(new_parent_id).await?.unwrap_or(0) + 1;
    tx.set_parent(node.id, new_parent_id, ordering).await?;

    tracing::debug!(node_id = %node.id, from = node.lft, to = insert_at, "Moved geo subtree");
    tx.find_by_id(node.id)
        .await?
        .ok_or(GeoError::NotFound(node.id))
}

/// Remove the node and all of its descendants, returning the row count
pub async fn delete_subtree(tx: &mut dyn GeoNodeTx, node_id: Uuid) -> Result<u64, GeoError> {
    let node = tx
        .find_by_id(node_id)
        .await?
        .ok_or(GeoError::NotFound(node_id))?;

    let removed = tx.delete_range(node.lft, node.rgt).await?;
    tx.shift_bounds(node.rgt + 1, -node.width()).await?;

    tracing::debug!(node_id = %node.id, removed, "Deleted geo subtree");
    Ok(removed)
}

/// Recompute every interval from `parent_id` links alone
pub async fn rebuild(tx: &mut dyn GeoNodeTx) -> Result<RebuildSummary, GeoError> {
    let nodes = tx.load_forest().await?;
    let (positions, roots) = compute_positions(&nodes)?;
    tx.write_positions(&positions).await?;

    Ok(RebuildSummary {
        nodes: positions.len(),
        roots,
    })
}

enum Step<'a> {
    Enter(&'a GeoNode, i32, i32),
    Exit(usize),
}

/// Pure depth-first numbering of a forest.
///
/// Siblings are visited by `(ordering, name, id)` and renumbered densely from
/// 1. Nodes whose parent does not exist are promoted to roots. Returns the
/// positions in pre-order together with the root count.
pub fn compute_positions(nodes: &[GeoNode]) -> Result<(Vec<NodePosition>, usize), GeoError> {
    let known: HashSet<Uuid> = nodes.iter().map(|n| n.id).collect();

    let mut children: HashMap<Option<Uuid>, Vec<&GeoNode>> = HashMap::new();
    for node in nodes {
        let parent = match node.parent_id {
            Some(pid) if known.contains(&pid) => Some(pid),
            Some(pid) => {
                tracing::warn!(
                    node_id = %node.id,
                    missing_parent = %pid,
                    "Geo node references a missing parent; numbering it as a root"
                );
                None
            }
            None => None,
        };
        children.entry(parent).or_default().push(node);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| {
            a.ordering
                .cmp(&b.ordering)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    let roots = children.get(&None).cloned().unwrap_or_default();
    let mut stack: Vec<Step> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, root)| Step::Enter(*root, 0, i as i32 + 1))
        .collect();

    let mut positions = Vec::with_capacity(nodes.len());
    let mut counter = 0;
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node, depth, ordering) => {
                counter += 1;
                positions.push(NodePosition {
                    id: node.id,
                    lft: counter,
                    rgt: counter,
                    depth,
                    ordering,
                });
                stack.push(Step::Exit(positions.len() - 1));
                if let Some(kids) = children.get(&Some(node.id)) {
                    for (i, child) in kids.iter().enumerate().rev() {
                        stack.push(Step::Enter(*child, depth + 1, i as i32 + 1));
                    }
                }
            }
            Step::Exit(slot) => {
                counter += 1;
                positions[slot].rgt = counter;
            }
        }
    }

    if positions.len() != nodes.len() {
        return Err(GeoError::Corrupted(format!(
            "{} node(s) are not reachable from any root; parent links contain a cycle",
            nodes.len() - positions.len()
        )));
    }

    Ok((positions, roots.len()))
}
