//! Hierarchical geodirectory backed by a nested-set forest.
//!
//! Every geographic entity (continent down to village) is a node carrying a
//! `parent_id` link plus `lft`/`rgt`/`depth` bounds, so subtree and ancestor
//! reads are single range scans. Structural writes run under one forest lock.
//!
//! ## Type hierarchy
//!
//! Each type lists the parent types it may sit under:
//!
//! - SUBCONTINENT: CONTINENT
//! - COUNTRY: CONTINENT, SUBCONTINENT
//! - STATE: COUNTRY
//! - PROVINCE: COUNTRY, STATE
//! - REGENCY: STATE, PROVINCE
//! - CITY: COUNTRY, STATE, PROVINCE, REGENCY
//! - DISTRICT: REGENCY, CITY
//! - SUBDISTRICT: DISTRICT
//! - VILLAGE: DISTRICT, SUBDISTRICT
//!
//! CONTINENT and COUNTRY may be roots.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | POST | `/api/geo-nodes` | Create a node |
//! | GET | `/api/geo-nodes/roots` | List roots |
//! | GET | `/api/geo-nodes/leaves` | List leaves |
//! | GET | `/api/geo-nodes/count?type=` | Count nodes of a type |
//! | GET | `/api/geo-nodes/validate` | Report structural violations |
//! | POST | `/api/geo-nodes/rebuild` | Recompute bounds from parent links |
//! | GET | `/api/geo-nodes/{id}` | Get a node |
//! | PUT | `/api/geo-nodes/{id}` | Update attributes |
//! | DELETE | `/api/geo-nodes/{id}` | Delete a subtree |
//! | POST | `/api/geo-nodes/{id}/move` | Move a subtree |
//! | GET | `/api/geo-nodes/{id}/hierarchy` | Node with parent and children |
//! | GET | `/api/geo-nodes/{id}/ancestors` | Ancestors, root first |
//! | GET | `/api/geo-nodes/{id}/descendants` | Descendants in pre-order |
//! | GET | `/api/geo-nodes/{id}/children?type=` | Direct children |
//! | GET | `/api/geo-nodes/{id}/siblings` | Siblings |
//! | GET | `/api/geo-nodes/{id}/stats` | Leaf flag and subtree counts |

pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

pub use services::GeoService;
