pub mod geo_node_handler;

pub use geo_node_handler::*;
