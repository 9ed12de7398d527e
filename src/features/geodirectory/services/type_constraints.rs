//! Allowed parent/child pairs between geographic node types.
//!
//! The table is plain data: each child type lists the parent types it may sit
//! under, and a separate list names the types allowed at the root level.
//! Every structural mutation consults it before touching the store.

use crate::features::geodirectory::error::GeoError;
use crate::features::geodirectory::models::GeoNodeType;

/// Types that may exist without a parent
const ROOT_TYPES: &[GeoNodeType] = &[GeoNodeType::Continent, GeoNodeType::Country];

/// Parent types a child of the given type may be attached to
pub fn allowed_parents(child: GeoNodeType) -> &'static [GeoNodeType] {
    use GeoNodeType::*;

    match child {
        Continent => &[],
        Subcontinent => &[Continent],
        Country => &[Continent, Subcontinent],
        State => &[Country],
        Province => &[Country, State],
        Regency => &[State, Province],
        City => &[Country, State, Province, Regency],
        District => &[Regency, City],
        Subdistrict => &[District],
        Village => &[District, Subdistrict],
    }
}

/// Whether `value` names a known node type
pub fn is_valid_type(value: &str) -> bool {
    value.parse::<GeoNodeType>().is_ok()
}

pub fn can_be_child_of(child: GeoNodeType, parent: GeoNodeType) -> bool {
    allowed_parents(child).contains(&parent)
}

pub fn can_be_root(node_type: GeoNodeType) -> bool {
    ROOT_TYPES.contains(&node_type)
}

/// Validate placing a `child` node under `parent` (`None` = root level)
pub fn check_placement(child: GeoNodeType, parent: Option<GeoNodeType>) -> Result<(), GeoError> {
    let allowed = match parent {
        Some(parent) => can_be_child_of(child, parent),
        None => can_be_root(child),
    };

    if allowed {
        Ok(())
    } else {
        Err(GeoError::TypeConstraint { child, parent })
    }
}
