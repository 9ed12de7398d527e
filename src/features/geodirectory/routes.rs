use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::geodirectory::handlers;
use crate::features::geodirectory::services::GeoService;

/// Create routes for the geodirectory feature
pub fn routes(service: Arc<GeoService>) -> Router {
    Router::new()
        .route("/api/geo-nodes", post(handlers::create_node))
        // Collection endpoints (literal segments take precedence over {id})
        .route("/api/geo-nodes/roots", get(handlers::list_roots))
        .route("/api/geo-nodes/leaves", get(handlers::list_leaves))
        .route("/api/geo-nodes/count", get(handlers::count_by_type))
        .route("/api/geo-nodes/validate", get(handlers::validate_hierarchy))
        .route("/api/geo-nodes/rebuild", post(handlers::rebuild_nested_set))
        // Single node
        .route(
            "/api/geo-nodes/{id}",
            get(handlers::get_node)
                .put(handlers::update_node)
                .delete(handlers::delete_node),
        )
        .route("/api/geo-nodes/{id}/move", post(handlers::move_node))
        .route(
            "/api/geo-nodes/{id}/hierarchy",
            get(handlers::get_node_hierarchy),
        )
        .route("/api/geo-nodes/{id}/stats", get(handlers::get_node_stats))
        // Traversal
        .route(
            "/api/geo-nodes/{id}/ancestors",
            get(handlers::list_ancestors),
        )
        .route(
            "/api/geo-nodes/{id}/descendants",
            get(handlers::list_descendants),
        )
        .route("/api/geo-nodes/{id}/children", get(handlers::list_children))
        .route("/api/geo-nodes/{id}/siblings", get(handlers::list_siblings))
        .with_state(service)
}
