mod geo_node;
mod geo_node_type;
mod violation;

pub use geo_node::{
    GeoNode, GeoNodeAttributes, GeoNodeWithHierarchy, NewGeoNode, NodePosition, RebuildSummary,
    UpdateGeoNode,
};
pub use geo_node_type::GeoNodeType;
pub use violation::{HierarchyViolation, ViolationKind};
