use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::features::geodirectory::models::{GeoNode, GeoNodeType, NewGeoNode};
use crate::features::geodirectory::services::type_constraints::{can_be_child_of, can_be_root};
use crate::features::geodirectory::services::{GeoService, GeoServiceSettings};
use crate::features::geodirectory::store::memory::MemoryGeoNodeStore;

pub fn test_settings() -> GeoServiceSettings {
    GeoServiceSettings {
        max_conflict_retries: 3,
        operation_timeout: Duration::from_secs(5),
    }
}

/// Service over a fresh in-memory store; the store handle allows fault
/// injection and snapshots
pub fn memory_service() -> (GeoService, MemoryGeoNodeStore) {
    let store = MemoryGeoNodeStore::new();
    let service = GeoService::new(Arc::new(store.clone()), test_settings());
    (service, store)
}

/// Unplaced node row for pure-function tests
pub fn raw_node(
    name: &str,
    node_type: GeoNodeType,
    parent_id: Option<Uuid>,
    ordering: i32,
) -> GeoNode {
    GeoNode {
        id: Uuid::now_v7(),
        name: name.to_string(),
        node_type,
        code: None,
        postal_code: None,
        latitude: None,
        longitude: None,
        parent_id,
        lft: 0,
        rgt: 1,
        depth: 0,
        ordering,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Ids of the fixture forest built by [`seed_indonesia`]
#[derive(Debug, Clone, Copy)]
pub struct SeededForest {
    pub asia: Uuid,
    pub indonesia: Uuid,
    pub west_java: Uuid,
    pub bandung: Uuid,
    pub coblong: Uuid,
    pub bogor: Uuid,
    pub central_java: Uuid,
    pub europe: Uuid,
}

/// Asia
/// └─ Indonesia
///    ├─ Jawa Barat
///    │  ├─ Bandung
///    │  │  └─ Coblong
///    │  └─ Bogor
///    └─ Jawa Tengah
/// Europe
pub async fn seed_indonesia(store: &MemoryGeoNodeStore) -> SeededForest {
    let service = GeoService::new(Arc::new(store.clone()), test_settings());
    let add = |name: &'static str, node_type: GeoNodeType, parent: Option<Uuid>| {
        let service = service.clone();
        async move {
            service
                .create(NewGeoNode::new(name, node_type), parent)
                .await
                .expect("seed insert")
                .id
        }
    };

    let asia = add("Asia", GeoNodeType::Continent, None).await;
    let indonesia = add("Indonesia", GeoNodeType::Country, Some(asia)).await;
    let west_java = add("Jawa Barat", GeoNodeType::Province, Some(indonesia)).await;
    let bandung = add("Bandung", GeoNodeType::City, Some(west_java)).await;
    let coblong = add("Coblong", GeoNodeType::District, Some(bandung)).await;
    let bogor = add("Bogor", GeoNodeType::Regency, Some(west_java)).await;
    let central_java = add("Jawa Tengah", GeoNodeType::Province, Some(indonesia)).await;
    let europe = add("Europe", GeoNodeType::Continent, None).await;

    SeededForest {
        asia,
        indonesia,
        west_java,
        bandung,
        coblong,
        bogor,
        central_java,
        europe,
    }
}

/// Panic unless `nodes` is a well-formed nested-set forest with contiguous
/// bounds `1..=2n`, consistent depths and allowed type pairs
pub fn assert_forest_invariants(nodes: &[GeoNode]) {
    let by_id: HashMap<Uuid, &GeoNode> = nodes.iter().map(|n| (n.id, n)).collect();

    let mut bounds: Vec<i32> = nodes.iter().flat_map(|n| [n.lft, n.rgt]).collect();
    bounds.sort_unstable();
    let expected: Vec<i32> = (1..=2 * nodes.len() as i32).collect();
    assert_eq!(bounds, expected, "bounds are not contiguous");

    for node in nodes {
        assert!(node.lft < node.rgt, "{} has inverted interval", node.name);
        assert_eq!((node.rgt - node.lft) % 2, 1, "{} has even width", node.name);

        let inside = nodes.iter().filter(|other| node.contains(other)).count() as i64;
        assert_eq!(node.descendant_count(), inside, "{} subtree size", node.name);

        match node.parent_id {
            None => {
                assert_eq!(node.depth, 0, "root {} depth", node.name);
                assert!(can_be_root(node.node_type), "{} cannot be a root", node.name);
            }
            Some(parent_id) => {
                let parent = by_id
                    .get(&parent_id)
                    .unwrap_or_else(|| panic!("{} has a dangling parent", node.name));
                assert!(parent.contains(node), "{} escapes its parent", node.name);
                assert_eq!(node.depth, parent.depth + 1, "{} depth", node.name);
                assert!(
                    can_be_child_of(node.node_type, parent.node_type),
                    "{} under {}",
                    node.node_type,
                    parent.node_type
                );
            }
        }

        for other in nodes {
            let disjoint = node.rgt < other.lft || other.rgt < node.lft;
            let nested = node.id == other.id || node.contains(other) || other.contains(node);
            assert!(disjoint || nested, "{} and {} overlap", node.name, other.name);
        }
    }
}
