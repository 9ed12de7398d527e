pub mod geo_service;
pub mod hierarchy_query;
pub mod integrity;
pub mod nested_set;
pub mod type_constraints;

pub use geo_service::{GeoService, GeoServiceSettings};
