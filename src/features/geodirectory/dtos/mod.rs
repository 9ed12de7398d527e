pub mod geo_node_dto;

pub use geo_node_dto::{
    ChildrenQuery, CountQuery, CreateGeoNodeDto, DeleteGeoNodeResponseDto, GeoNodeCountDto,
    GeoNodeHierarchyResponseDto, GeoNodeResponseDto, GeoNodeStatsDto, HierarchyViolationDto,
    MoveGeoNodeDto, RebuildResponseDto, UpdateGeoNodeDto,
};
