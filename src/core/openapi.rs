use utoipa::{Modify, OpenApi};

use crate::features::geodirectory::{dtos as geo_dtos, handlers as geo_handlers, models as geo_models};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Mutations
        geo_handlers::create_node,
        geo_handlers::update_node,
        geo_handlers::delete_node,
        geo_handlers::move_node,
        geo_handlers::rebuild_nested_set,
        // Lookups
        geo_handlers::get_node,
        geo_handlers::get_node_hierarchy,
        geo_handlers::get_node_stats,
        // Traversal
        geo_handlers::list_ancestors,
        geo_handlers::list_descendants,
        geo_handlers::list_children,
        geo_handlers::list_siblings,
        geo_handlers::list_roots,
        geo_handlers::list_leaves,
        // Maintenance
        geo_handlers::count_by_type,
        geo_handlers::validate_hierarchy,
    ),
    components(
        schemas(
            Meta,
            geo_models::GeoNodeType,
            geo_models::ViolationKind,
            geo_dtos::CreateGeoNodeDto,
            geo_dtos::UpdateGeoNodeDto,
            geo_dtos::MoveGeoNodeDto,
            geo_dtos::GeoNodeResponseDto,
            geo_dtos::GeoNodeHierarchyResponseDto,
            geo_dtos::GeoNodeStatsDto,
            geo_dtos::GeoNodeCountDto,
            geo_dtos::DeleteGeoNodeResponseDto,
            geo_dtos::RebuildResponseDto,
            geo_dtos::HierarchyViolationDto,
            ApiResponse<geo_dtos::GeoNodeResponseDto>,
            ApiResponse<Vec<geo_dtos::GeoNodeResponseDto>>,
            ApiResponse<geo_dtos::GeoNodeHierarchyResponseDto>,
            ApiResponse<geo_dtos::GeoNodeStatsDto>,
            ApiResponse<geo_dtos::GeoNodeCountDto>,
            ApiResponse<geo_dtos::DeleteGeoNodeResponseDto>,
            ApiResponse<geo_dtos::RebuildResponseDto>,
            ApiResponse<Vec<geo_dtos::HierarchyViolationDto>>,
        )
    ),
    tags(
        (name = "geo-nodes", description = "Hierarchical geodirectory (continents down to villages) stored as a nested set"),
    ),
    info(
        title = "Geodirectory API",
        version = "0.1.0",
        description = "API documentation for the geodirectory service",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
