//! Consistency scan over a loaded forest.

use std::collections::HashMap;

use uuid::Uuid;

use crate::features::geodirectory::models::{GeoNode, HierarchyViolation, ViolationKind};
use crate::features::geodirectory::services::type_constraints::{can_be_child_of, can_be_root};

fn violation(node: &GeoNode, kind: ViolationKind, detail: String) -> HierarchyViolation {
    HierarchyViolation {
        node_id: node.id,
        node_name: node.name.clone(),
        kind,
        detail,
    }
}

/// Report every node that breaks an interval, depth or type rule.
/// Violations are listed in the order of `nodes`.
pub fn scan_violations(nodes: &[GeoNode]) -> Vec<HierarchyViolation> {
    let by_id: HashMap<Uuid, &GeoNode> = nodes.iter().map(|n| (n.id, n)).collect();
    let mut violations = Vec::new();

    for node in nodes {
        if node.lft >= node.rgt {
            violations.push(violation(
                node,
                ViolationKind::InvertedInterval,
                format!("lft {} is not below rgt {}", node.lft, node.rgt),
            ));
        }

        let Some(parent_id) = node.parent_id else {
            if !can_be_root(node.node_type) {
                violations.push(violation(
                    node,
                    ViolationKind::RootTypeNotAllowed,
                    format!("{} nodes cannot be roots", node.node_type),
                ));
            }
            if node.depth != 0 {
                violations.push(violation(
                    node,
                    ViolationKind::DepthMismatch,
                    format!("root has depth {}", node.depth),
                ));
            }
            continue;
        };

        let Some(parent) = by_id.get(&parent_id) else {
            violations.push(violation(
                node,
                ViolationKind::MissingParent,
                format!("parent {} does not exist", parent_id),
            ));
            continue;
        };

        if !can_be_child_of(node.node_type, parent.node_type) {
            violations.push(violation(
                node,
                ViolationKind::ParentTypeMismatch,
                format!("{} under {}", node.node_type, parent.node_type),
            ));
        }
        if !parent.contains(node) {
            violations.push(violation(
                node,
                ViolationKind::OutsideParentInterval,
                format!(
                    "[{}, {}] is not inside parent [{}, {}]",
                    node.lft, node.rgt, parent.lft, parent.rgt
                ),
            ));
        }
        if node.depth != parent.depth + 1 {
            violations.push(violation(
                node,
                ViolationKind::DepthMismatch,
                format!("depth {} under parent depth {}", node.depth, parent.depth),
            ));
        }
    }

    violations
}
