use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, RequestDeadline};
use crate::features::geodirectory::dtos::{
    ChildrenQuery, CountQuery, CreateGeoNodeDto, DeleteGeoNodeResponseDto, GeoNodeCountDto,
    GeoNodeHierarchyResponseDto, GeoNodeResponseDto, GeoNodeStatsDto, HierarchyViolationDto,
    MoveGeoNodeDto, RebuildResponseDto, UpdateGeoNodeDto,
};
use crate::features::geodirectory::models::GeoNode;
use crate::features::geodirectory::services::GeoService;
use crate::features::geodirectory::store::Page;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

fn list_response(
    (nodes, total): (Vec<GeoNode>, i64),
) -> Json<ApiResponse<Vec<GeoNodeResponseDto>>> {
    let dtos: Vec<GeoNodeResponseDto> = nodes.into_iter().map(Into::into).collect();
    Json(ApiResponse::success(Some(dtos), None, Meta::total(total)))
}

// ==================== Mutations ====================

/// Create a geo node
#[utoipa::path(
    post,
    path = "/api/geo-nodes",
    params(
        ("x-request-timeout-ms" = Option<u64>, Header, description = "Optional deadline in milliseconds, only applied when tighter than the server default")
    ),
    request_body = CreateGeoNodeDto,
    responses(
        (status = 201, description = "Node created", body = ApiResponse<GeoNodeResponseDto>),
        (status = 400, description = "Validation error or type constraint violated"),
        (status = 404, description = "Parent not found"),
        (status = 409, description = "Concurrent structural write"),
        (status = 503, description = "Deadline exceeded")
    ),
    tag = "geo-nodes"
)]
pub async fn create_node(
    State(service): State<Arc<GeoService>>,
    RequestDeadline(deadline): RequestDeadline,
    AppJson(dto): AppJson<CreateGeoNodeDto>,
) -> Result<(StatusCode, Json<ApiResponse<GeoNodeResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let service = service.bounded_by(deadline);

    let (new, parent_id) = dto.into_parts();
    let node = service.create(new, parent_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(node.into()),
            Some("Geo node created".to_string()),
            None,
        )),
    ))
}

/// Update descriptive attributes of a geo node
#[utoipa::path(
    put,
    path = "/api/geo-nodes/{id}",
    params(
        ("id" = Uuid, Path, description = "Geo node ID"),
        ("x-request-timeout-ms" = Option<u64>, Header, description = "Optional deadline in milliseconds, only applied when tighter than the server default")
    ),
    request_body = UpdateGeoNodeDto,
    responses(
        (status = 200, description = "Node updated", body = ApiResponse<GeoNodeResponseDto>),
        (status = 400, description = "Validation error or structural field changed"),
        (status = 404, description = "Node not found")
    ),
    tag = "geo-nodes"
)]
pub async fn update_node(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
    RequestDeadline(deadline): RequestDeadline,
    AppJson(dto): AppJson<UpdateGeoNodeDto>,
) -> Result<Json<ApiResponse<GeoNodeResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let service = service.bounded_by(deadline);

    let node = service.update(id, dto.into()).await?;
    Ok(Json(ApiResponse::success(
        Some(node.into()),
        Some("Geo node updated".to_string()),
        None,
    )))
}

/// Delete a geo node together with its whole subtree
#[utoipa::path(
    delete,
    path = "/api/geo-nodes/{id}",
    params(
        ("id" = Uuid, Path, description = "Geo node ID"),
        ("x-request-timeout-ms" = Option<u64>, Header, description = "Optional deadline in milliseconds, only applied when tighter than the server default")
    ),
    responses(
        (status = 200, description = "Subtree deleted", body = ApiResponse<DeleteGeoNodeResponseDto>),
        (status = 404, description = "Node not found"),
        (status = 409, description = "Concurrent structural write"),
        (status = 503, description = "Deadline exceeded")
    ),
    tag = "geo-nodes"
)]
pub async fn delete_node(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
    RequestDeadline(deadline): RequestDeadline,
) -> Result<Json<ApiResponse<DeleteGeoNodeResponseDto>>> {
    let removed = service.bounded_by(deadline).delete(id).await?;
    Ok(Json(ApiResponse::success(
        Some(DeleteGeoNodeResponseDto { id, removed }),
        Some("Geo node deleted".to_string()),
        None,
    )))
}

/// Move a geo node (and its subtree) under a new parent, or to the root level
#[utoipa::path(
    post,
    path = "/api/geo-nodes/{id}/move",
    params(
        ("id" = Uuid, Path, description = "Geo node ID"),
        ("x-request-timeout-ms" = Option<u64>, Header, description = "Optional deadline in milliseconds, only applied when tighter than the server default")
    ),
    request_body = MoveGeoNodeDto,
    responses(
        (status = 200, description = "Node moved", body = ApiResponse<GeoNodeResponseDto>),
        (status = 400, description = "Cycle or type constraint violated"),
        (status = 404, description = "Node or target not found"),
        (status = 409, description = "Concurrent structural write"),
        (status = 503, description = "Deadline exceeded")
    ),
    tag = "geo-nodes"
)]
pub async fn move_node(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
    RequestDeadline(deadline): RequestDeadline,
    AppJson(dto): AppJson<MoveGeoNodeDto>,
) -> Result<Json<ApiResponse<GeoNodeResponseDto>>> {
    let node = service
        .bounded_by(deadline)
        .move_node(id, dto.new_parent_id)
        .await?;
    Ok(Json(ApiResponse::success(
        Some(node.into()),
        Some("Geo node moved".to_string()),
        None,
    )))
}

/// Recompute every interval and depth from parent links
#[utoipa::path(
    post,
    path = "/api/geo-nodes/rebuild",
    params(
        ("x-request-timeout-ms" = Option<u64>, Header, description = "Optional deadline in milliseconds, only applied when tighter than the server default")
    ),
    responses(
        (status = 200, description = "Nested set rebuilt", body = ApiResponse<RebuildResponseDto>),
        (status = 500, description = "Parent links are corrupted")
    ),
    tag = "geo-nodes"
)]
pub async fn rebuild_nested_set(
    State(service): State<Arc<GeoService>>,
    RequestDeadline(deadline): RequestDeadline,
) -> Result<Json<ApiResponse<RebuildResponseDto>>> {
    let summary = service.bounded_by(deadline).rebuild_nested_set().await?;
    Ok(Json(ApiResponse::success(
        Some(summary.into()),
        Some("Nested set rebuilt".to_string()),
        None,
    )))
}

// ==================== Lookups ====================

/// Get a geo node by ID
#[utoipa::path(
    get,
    path = "/api/geo-nodes/{id}",
    params(("id" = Uuid, Path, description = "Geo node ID")),
    responses(
        (status = 200, description = "Node details", body = ApiResponse<GeoNodeResponseDto>),
        (status = 404, description = "Node not found")
    ),
    tag = "geo-nodes"
)]
pub async fn get_node(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<GeoNodeResponseDto>>> {
    let node = service.get_by_id(id).await?;
    Ok(Json(ApiResponse::success(Some(node.into()), None, None)))
}

/// Get a geo node with its parent and direct children
#[utoipa::path(
    get,
    path = "/api/geo-nodes/{id}/hierarchy",
    params(("id" = Uuid, Path, description = "Geo node ID")),
    responses(
        (status = 200, description = "Node with parent and children", body = ApiResponse<GeoNodeHierarchyResponseDto>),
        (status = 404, description = "Node not found")
    ),
    tag = "geo-nodes"
)]
pub async fn get_node_hierarchy(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<GeoNodeHierarchyResponseDto>>> {
    let view = service.with_hierarchy(id).await?;
    Ok(Json(ApiResponse::success(Some(view.into()), None, None)))
}

/// Leaf flag and subtree counts for a geo node
#[utoipa::path(
    get,
    path = "/api/geo-nodes/{id}/stats",
    params(("id" = Uuid, Path, description = "Geo node ID")),
    responses(
        (status = 200, description = "Node statistics", body = ApiResponse<GeoNodeStatsDto>),
        (status = 404, description = "Node not found")
    ),
    tag = "geo-nodes"
)]
pub async fn get_node_stats(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<GeoNodeStatsDto>>> {
    let is_leaf = service.is_leaf(id).await?;
    let has_children = service.has_children(id).await?;
    let child_count = service.count_children(id).await?;
    let descendant_count = service.count_descendants(id).await?;

    Ok(Json(ApiResponse::success(
        Some(GeoNodeStatsDto {
            id,
            is_leaf,
            has_children,
            child_count,
            descendant_count,
        }),
        None,
        None,
    )))
}

// ==================== Traversal ====================

/// Ancestors of a geo node, root first
#[utoipa::path(
    get,
    path = "/api/geo-nodes/{id}/ancestors",
    params(("id" = Uuid, Path, description = "Geo node ID")),
    responses(
        (status = 200, description = "Ancestors ordered by depth", body = ApiResponse<Vec<GeoNodeResponseDto>>),
        (status = 404, description = "Node not found")
    ),
    tag = "geo-nodes"
)]
pub async fn list_ancestors(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<GeoNodeResponseDto>>>> {
    let nodes = service.ancestors(id).await?;
    let total = nodes.len() as i64;
    Ok(list_response((nodes, total)))
}

/// Descendants of a geo node in pre-order
#[utoipa::path(
    get,
    path = "/api/geo-nodes/{id}/descendants",
    params(("id" = Uuid, Path, description = "Geo node ID"), PaginationQuery),
    responses(
        (status = 200, description = "Paginated descendants", body = ApiResponse<Vec<GeoNodeResponseDto>>),
        (status = 404, description = "Node not found")
    ),
    tag = "geo-nodes"
)]
pub async fn list_descendants(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<GeoNodeResponseDto>>>> {
    let paged = service.descendants(id, Some(Page::from(&query))).await?;
    Ok(list_response(paged))
}

/// Direct children of a geo node, optionally filtered by type
#[utoipa::path(
    get,
    path = "/api/geo-nodes/{id}/children",
    params(("id" = Uuid, Path, description = "Geo node ID"), ChildrenQuery),
    responses(
        (status = 200, description = "Paginated children in sibling order", body = ApiResponse<Vec<GeoNodeResponseDto>>),
        (status = 400, description = "Unknown type filter"),
        (status = 404, description = "Node not found")
    ),
    tag = "geo-nodes"
)]
pub async fn list_children(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChildrenQuery>,
) -> Result<Json<ApiResponse<Vec<GeoNodeResponseDto>>>> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let paged = service
        .children(id, query.node_type()?, Some(query.page()))
        .await?;
    Ok(list_response(paged))
}

/// Other children of the same parent (other roots for a root)
#[utoipa::path(
    get,
    path = "/api/geo-nodes/{id}/siblings",
    params(("id" = Uuid, Path, description = "Geo node ID"), PaginationQuery),
    responses(
        (status = 200, description = "Paginated siblings", body = ApiResponse<Vec<GeoNodeResponseDto>>),
        (status = 404, description = "Node not found")
    ),
    tag = "geo-nodes"
)]
pub async fn list_siblings(
    State(service): State<Arc<GeoService>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<GeoNodeResponseDto>>>> {
    let paged = service.siblings(id, Some(Page::from(&query))).await?;
    Ok(list_response(paged))
}

/// Root nodes of the forest
#[utoipa::path(
    get,
    path = "/api/geo-nodes/roots",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Paginated roots", body = ApiResponse<Vec<GeoNodeResponseDto>>)
    ),
    tag = "geo-nodes"
)]
pub async fn list_roots(
    State(service): State<Arc<GeoService>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<GeoNodeResponseDto>>>> {
    let paged = service.roots(Some(Page::from(&query))).await?;
    Ok(list_response(paged))
}

/// Nodes without children
#[utoipa::path(
    get,
    path = "/api/geo-nodes/leaves",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Paginated leaves", body = ApiResponse<Vec<GeoNodeResponseDto>>)
    ),
    tag = "geo-nodes"
)]
pub async fn list_leaves(
    State(service): State<Arc<GeoService>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<GeoNodeResponseDto>>>> {
    let paged = service.leaves(Some(Page::from(&query))).await?;
    Ok(list_response(paged))
}

// ==================== Maintenance ====================

/// Count nodes of one type
#[utoipa::path(
    get,
    path = "/api/geo-nodes/count",
    params(CountQuery),
    responses(
        (status = 200, description = "Node count", body = ApiResponse<GeoNodeCountDto>),
        (status = 400, description = "Unknown type")
    ),
    tag = "geo-nodes"
)]
pub async fn count_by_type(
    State(service): State<Arc<GeoService>>,
    Query(query): Query<CountQuery>,
) -> Result<Json<ApiResponse<GeoNodeCountDto>>> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let node_type = query.node_type()?;
    let count = service.count_by_type(node_type).await?;
    Ok(Json(ApiResponse::success(
        Some(GeoNodeCountDto { node_type, count }),
        None,
        None,
    )))
}

/// Scan the forest for structural violations
#[utoipa::path(
    get,
    path = "/api/geo-nodes/validate",
    responses(
        (status = 200, description = "Violations found (empty when healthy)", body = ApiResponse<Vec<HierarchyViolationDto>>)
    ),
    tag = "geo-nodes"
)]
pub async fn validate_hierarchy(
    State(service): State<Arc<GeoService>>,
) -> Result<Json<ApiResponse<Vec<HierarchyViolationDto>>>> {
    let violations = service.validate_hierarchy().await?;
    let total = violations.len() as i64;
    let dtos: Vec<HierarchyViolationDto> = violations.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Meta::total(total),
    )))
}
