use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of structural problem found by a hierarchy scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// `lft >= rgt`
    InvertedInterval,
    /// Node type is not allowed under its parent's type
    ParentTypeMismatch,
    /// Node type must have a parent but the node is a root
    RootTypeNotAllowed,
    /// `parent_id` references a row that does not exist
    MissingParent,
    /// Node interval is not strictly inside its parent's interval
    OutsideParentInterval,
    /// `depth` differs from `parent.depth + 1` (or 0 for roots)
    DepthMismatch,
}

/// One problem reported by `validate_hierarchy`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyViolation {
    pub node_id: Uuid,
    pub node_name: String,
    pub kind: ViolationKind,
    pub detail: String,
}
