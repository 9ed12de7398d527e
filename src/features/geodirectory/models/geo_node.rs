use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::GeoNodeType;

/// Geographic node stored in the nested-set forest.
///
/// `lft`, `rgt`, `depth` and `ordering` form a computed index. They are only
/// written by the nested-set maintainer and must never be set from request data.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct GeoNode {
    pub id: Uuid,
    pub name: String,
    pub node_type: GeoNodeType,
    pub code: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub parent_id: Option<Uuid>,
    pub lft: i32,
    pub rgt: i32,
    pub depth: i32,
    pub ordering: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GeoNode {
    /// Size of the node's interval, `rgt - lft + 1`
    pub fn width(&self) -> i32 {
        self.rgt - self.lft + 1
    }

    pub fn is_leaf(&self) -> bool {
        self.rgt - self.lft == 1
    }

    /// Number of descendants, excluding the node itself
    pub fn descendant_count(&self) -> i64 {
        i64::from((self.rgt - self.lft - 1) / 2)
    }

    /// Whether `other` lies strictly inside this node's interval
    pub fn contains(&self, other: &GeoNode) -> bool {
        self.lft < other.lft && other.rgt < self.rgt
    }
}

/// Descriptive attributes supplied when a node is created
#[derive(Debug, Clone)]
pub struct NewGeoNode {
    pub name: String,
    pub node_type: GeoNodeType,
    pub code: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NewGeoNode {
    pub fn new(name: impl Into<String>, node_type: GeoNodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            code: None,
            postal_code: None,
            latitude: None,
            longitude: None,
        }
    }
}

/// Partial update request. For the optional attributes the outer `Option` is
/// "field present" and the inner one is the new value, so `Some(None)` clears
/// it. `node_type` and `parent_id` are accepted only so that attempts to
/// change them can be rejected; moves go through `move_node`.
#[derive(Debug, Clone, Default)]
pub struct UpdateGeoNode {
    pub name: Option<String>,
    pub node_type: Option<GeoNodeType>,
    pub parent_id: Option<Option<Uuid>>,
    pub code: Option<Option<String>>,
    pub postal_code: Option<Option<String>>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
}

/// Full set of non-structural columns written by an attribute update
#[derive(Debug, Clone, PartialEq)]
pub struct GeoNodeAttributes {
    pub name: String,
    pub code: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoNodeAttributes {
    /// Merge a partial update over the node's current attributes
    pub fn merged(node: &GeoNode, update: UpdateGeoNode) -> Self {
        Self {
            name: update.name.unwrap_or_else(|| node.name.clone()),
            code: update.code.unwrap_or_else(|| node.code.clone()),
            postal_code: update
                .postal_code
                .unwrap_or_else(|| node.postal_code.clone()),
            latitude: update.latitude.unwrap_or(node.latitude),
            longitude: update.longitude.unwrap_or(node.longitude),
        }
    }
}

/// Interval assignment for one node, produced by a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePosition {
    pub id: Uuid,
    pub lft: i32,
    pub rgt: i32,
    pub depth: i32,
    pub ordering: i32,
}

/// A node together with its resolved parent and direct children
#[derive(Debug, Clone)]
pub struct GeoNodeWithHierarchy {
    pub node: GeoNode,
    pub parent: Option<GeoNode>,
    pub children: Vec<GeoNode>,
}

/// Outcome of a full nested-set rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    pub nodes: usize,
    pub roots: usize,
}
