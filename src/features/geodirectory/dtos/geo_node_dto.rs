use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::core::error::AppError;
use crate::features::geodirectory::models::{
    GeoNode, GeoNodeType, GeoNodeWithHierarchy, HierarchyViolation, NewGeoNode, RebuildSummary,
    UpdateGeoNode, ViolationKind,
};
use crate::features::geodirectory::services::type_constraints::is_valid_type;
use crate::features::geodirectory::store::Page;
use crate::shared::types::{default_page, default_page_size, PaginationQuery};
use crate::shared::validation::GEO_CODE_REGEX;

fn validate_node_type(value: &str) -> Result<(), ValidationError> {
    if is_valid_type(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("node_type");
        err.message = Some(format!("'{}' is not a known geo node type", value).into());
        Err(err)
    }
}

fn parse_node_type(value: &str) -> Result<GeoNodeType, AppError> {
    value.parse::<GeoNodeType>().map_err(AppError::Validation)
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`
/// (via `#[serde(default)]`), `null` becomes `Some(None)`
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<&PaginationQuery> for Page {
    fn from(query: &PaginationQuery) -> Self {
        Page::new(query.limit(), query.offset())
    }
}

// ==================== Requests ====================

/// Create request. The node is appended as the last child of `parentId`, or as
/// the last root when `parentId` is omitted.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeoNodeDto {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Jawa Barat")]
    pub name: String,

    #[serde(rename = "type")]
    pub node_type: GeoNodeType,

    pub parent_id: Option<Uuid>,

    /// Administrative code, dot or hyphen separated (e.g. `32.73`)
    #[validate(length(min = 1, max = 50), regex(path = *GEO_CODE_REGEX, message = "code must be alphanumeric segments separated by '.' or '-'"))]
    pub code: Option<String>,

    #[validate(length(min = 1, max = 16))]
    pub postal_code: Option<String>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl CreateGeoNodeDto {
    pub fn into_parts(self) -> (NewGeoNode, Option<Uuid>) {
        (
            NewGeoNode {
                code: self.code,
                postal_code: self.postal_code,
                latitude: self.latitude,
                longitude: self.longitude,
                ..NewGeoNode::new(self.name, self.node_type)
            },
            self.parent_id,
        )
    }
}

/// Attribute update. Omitted fields are left as they are and `null` clears an
/// optional attribute. `type` and `parentId` are accepted only when unchanged;
/// use the move endpoint to re-parent a node.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeoNodeDto {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub node_type: Option<GeoNodeType>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Uuid>)]
    pub parent_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    #[validate(length(min = 1, max = 50), regex(path = *GEO_CODE_REGEX, message = "code must be alphanumeric segments separated by '.' or '-'"))]
    pub code: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    #[validate(length(min = 1, max = 16))]
    pub postal_code: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<f64>)]
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<Option<f64>>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<f64>)]
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<Option<f64>>,
}

impl From<UpdateGeoNodeDto> for UpdateGeoNode {
    fn from(dto: UpdateGeoNodeDto) -> Self {
        Self {
            name: dto.name,
            node_type: dto.node_type,
            parent_id: dto.parent_id,
            code: dto.code,
            postal_code: dto.postal_code,
            latitude: dto.latitude,
            longitude: dto.longitude,
        }
    }
}

/// Move request. `newParentId` is required; send `null` to promote the node
/// to a root.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveGeoNodeDto {
    #[serde(deserialize_with = "Option::deserialize")]
    #[schema(required = true)]
    pub new_parent_id: Option<Uuid>,
}

/// Query parameters for listing children
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    pub page: i64,

    /// Items per page
    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    pub page_size: i64,

    /// Only children of this type (e.g. `CITY`)
    #[serde(rename = "type")]
    #[param(example = "CITY")]
    #[validate(custom(function = "validate_node_type"))]
    pub node_type: Option<String>,
}

impl ChildrenQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }

    pub fn page(&self) -> Page {
        Page::from(&self.pagination())
    }

    pub fn node_type(&self) -> Result<Option<GeoNodeType>, AppError> {
        self.node_type.as_deref().map(parse_node_type).transpose()
    }
}

/// Query parameters for counting nodes of one type
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
pub struct CountQuery {
    #[serde(rename = "type")]
    #[param(example = "PROVINCE")]
    #[validate(custom(function = "validate_node_type"))]
    pub node_type: String,
}

impl CountQuery {
    pub fn node_type(&self) -> Result<GeoNodeType, AppError> {
        parse_node_type(&self.node_type)
    }
}

// ==================== Responses ====================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeoNodeResponseDto {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: GeoNodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub parent_id: Option<Uuid>,
    pub lft: i32,
    pub rgt: i32,
    pub depth: i32,
    pub ordering: i32,
    pub is_leaf: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GeoNode> for GeoNodeResponseDto {
    fn from(node: GeoNode) -> Self {
        Self {
            is_leaf: node.is_leaf(),
            id: node.id,
            name: node.name,
            node_type: node.node_type,
            code: node.code,
            postal_code: node.postal_code,
            latitude: node.latitude,
            longitude: node.longitude,
            parent_id: node.parent_id,
            lft: node.lft,
            rgt: node.rgt,
            depth: node.depth,
            ordering: node.ordering,
            created_at: node.created_at,
            updated_at: node.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeoNodeHierarchyResponseDto {
    pub node: GeoNodeResponseDto,
    pub parent: Option<GeoNodeResponseDto>,
    pub children: Vec<GeoNodeResponseDto>,
}

impl From<GeoNodeWithHierarchy> for GeoNodeHierarchyResponseDto {
    fn from(view: GeoNodeWithHierarchy) -> Self {
        Self {
            node: view.node.into(),
            parent: view.parent.map(Into::into),
            children: view.children.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeoNodeStatsDto {
    pub id: Uuid,
    pub is_leaf: bool,
    pub has_children: bool,
    pub child_count: i64,
    pub descendant_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeoNodeCountDto {
    #[serde(rename = "type")]
    pub node_type: GeoNodeType,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGeoNodeResponseDto {
    pub id: Uuid,
    /// Rows removed, including the node itself
    pub removed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebuildResponseDto {
    pub nodes: usize,
    pub roots: usize,
}

impl From<RebuildSummary> for RebuildResponseDto {
    fn from(summary: RebuildSummary) -> Self {
        Self {
            nodes: summary.nodes,
            roots: summary.roots,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyViolationDto {
    pub node_id: Uuid,
    pub node_name: String,
    pub kind: ViolationKind,
    pub detail: String,
}

impl From<HierarchyViolation> for HierarchyViolationDto {
    fn from(v: HierarchyViolation) -> Self {
        Self {
            node_id: v.node_id,
            node_name: v.node_name,
            kind: v.kind,
            detail: v.detail,
        }
    }
}
