use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use uuid::Uuid;

use crate::core::config::GeoDirectoryConfig;
use crate::features::geodirectory::error::GeoError;
use crate::features::geodirectory::models::{
    GeoNode, GeoNodeAttributes, GeoNodeType, GeoNodeWithHierarchy, HierarchyViolation, NewGeoNode,
    RebuildSummary, UpdateGeoNode,
};
use crate::features::geodirectory::services::hierarchy_query::{HierarchyQuery, Paged};
use crate::features::geodirectory::services::{integrity, nested_set};
use crate::features::geodirectory::store::{GeoNodeStore, GeoNodeTx, NodeFilter, NodeOrder, Page};

type Result<T> = std::result::Result<T, GeoError>;

#[derive(Debug, Clone, Copy)]
pub struct GeoServiceSettings {
    pub max_conflict_retries: u32,
    pub operation_timeout: Duration,
}

impl From<&GeoDirectoryConfig> for GeoServiceSettings {
    fn from(config: &GeoDirectoryConfig) -> Self {
        Self {
            max_conflict_retries: config.max_conflict_retries,
            operation_timeout: config.operation_timeout,
        }
    }
}

/// Entry point for every geodirectory read and structural mutation.
///
/// Structural mutations (create, move, delete, rebuild) each run in one store
/// transaction holding the forest lock, are retried on transaction conflicts
/// and are bounded by the operation deadline. Cloning is cheap and shares the
/// underlying store.
#[derive(Clone)]
pub struct GeoService {
    store: Arc<dyn GeoNodeStore>,
    query: HierarchyQuery,
    settings: GeoServiceSettings,
}

impl std::fmt::Debug for GeoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoService")
            .field("store", &"<GeoNodeStore>")
            .field("settings", &self.settings)
            .finish()
    }
}

impl GeoService {
    pub fn new(store: Arc<dyn GeoNodeStore>, settings: GeoServiceSettings) -> Self {
        Self {
            query: HierarchyQuery::new(Arc::clone(&store)),
            store,
            settings,
        }
    }

    /// A view of the same service bounded by a caller-supplied deadline
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut service = self.clone();
        service.settings.operation_timeout = timeout;
        service
    }

    /// Apply a caller deadline only when it is tighter than the configured one
    pub fn bounded_by(&self, deadline: Option<Duration>) -> Self {
        match deadline {
            Some(timeout) if timeout < self.settings.operation_timeout => {
                self.with_timeout(timeout)
            }
            _ => self.clone(),
        }
    }

    async fn within_deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.settings.operation_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(?timeout, "Geodirectory operation exceeded its deadline");
                Err(GeoError::DeadlineExceeded(timeout))
            }
        }
    }

    async fn attempt_structural<T, F>(&self, op: &F) -> Result<T>
    where
        F: for<'t> Fn(&'t mut dyn GeoNodeTx) -> BoxFuture<'t, Result<T>>,
    {
        let mut tx = self.store.begin().await?;
        tx.lock_forest().await?;
        let value = op(tx.as_mut()).await?;
        tx.commit().await?;
        Ok(value)
    }

    /// Run `op` in a locked transaction, retrying the whole transaction on
    /// conflict up to the configured number of extra attempts
    async fn run_structural<T, F>(&self, operation: &'static str, op: F) -> Result<T>
    where
        T: Send,
        F: for<'t> Fn(&'t mut dyn GeoNodeTx) -> BoxFuture<'t, Result<T>> + Send + Sync,
    {
        let max_retries = self.settings.max_conflict_retries;
        self.within_deadline(async {
            let mut attempts: u32 = 0;
            loop {
                attempts += 1;
                match self.attempt_structural(&op).await {
                    Err(e) if e.is_conflict() && attempts <= max_retries => {
                        tracing::warn!(operation, attempts, "Structural mutation conflicted, retrying");
                    }
                    Err(e) if e.is_conflict() => {
                        tracing::error!(operation, attempts, "Structural mutation kept conflicting");
                        return Err(GeoError::TransactionConflict { attempts });
                    }
                    result => return result,
                }
            }
        })
        .await
    }

    pub async fn create(&self, new: NewGeoNode, parent_id: Option<Uuid>) -> Result<GeoNode> {
        let node = self
            .run_structural("create", move |tx| {
                nested_set::insert_node(tx, new.clone(), parent_id).boxed()
            })
            .await?;

        tracing::info!(
            node_id = %node.id,
            node_type = %node.node_type,
            parent_id = ?parent_id,
            "Geo node created"
        );
        Ok(node)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<GeoNode> {
        self.within_deadline(self.query.get_by_id(id)).await
    }

    /// Change descriptive attributes. `node_type` and `parent_id` may only be
    /// echoed back unchanged.
    pub async fn update(&self, id: Uuid, update: UpdateGeoNode) -> Result<GeoNode> {
        self.within_deadline(async {
            let current = self.query.get_by_id(id).await?;

            if update.node_type.is_some_and(|t| t != current.node_type) {
                return Err(GeoError::ImmutableField("type"));
            }
            if update.parent_id.is_some_and(|p| p != current.parent_id) {
                return Err(GeoError::ImmutableField("parent_id"));
            }

            let attrs = GeoNodeAttributes::merged(&current, update);
            let node = self
                .store
                .update_attributes(id, &attrs)
                .await?
                .ok_or(GeoError::NotFound(id))?;

            tracing::info!(node_id = %id, "Geo node updated");
            Ok(node)
        })
        .await
    }

    pub async fn move_node(&self, id: Uuid, new_parent_id: Option<Uuid>) -> Result<GeoNode> {
        let node = self
            .run_structural("move", move |tx| {
                nested_set::move_subtree(tx, id, new_parent_id).boxed()
            })
            .await?;

        tracing::info!(node_id = %id, new_parent_id = ?new_parent_id, "Geo node moved");
        Ok(node)
    }

    /// Delete the node and its whole subtree
    pub async fn delete(&self, id: Uuid) -> Result<u64> {
        let removed = self
            .run_structural("delete", move |tx| nested_set::delete_subtree(tx, id).boxed())
            .await?;

        tracing::info!(node_id = %id, removed, "Geo subtree deleted");
        Ok(removed)
    }

    pub async fn rebuild_nested_set(&self) -> Result<RebuildSummary> {
        let summary = self
            .run_structural("rebuild", |tx| nested_set::rebuild(tx).boxed())
            .await?;

        tracing::info!(
            nodes = summary.nodes,
            roots = summary.roots,
            "Nested set rebuilt"
        );
        Ok(summary)
    }

    pub async fn with_hierarchy(&self, id: Uuid) -> Result<GeoNodeWithHierarchy> {
        self.within_deadline(async {
            let node = self.query.get_by_id(id).await?;
            let parent = match node.parent_id {
                Some(parent_id) => self.store.find_by_id(parent_id).await?,
                None => None,
            };
            let (children, _) = self.query.children_of(&node, None, None).await?;

            Ok(GeoNodeWithHierarchy {
                node,
                parent,
                children,
            })
        })
        .await
    }

    /// Scan the whole forest for inconsistencies without changing anything
    pub async fn validate_hierarchy(&self) -> Result<Vec<HierarchyViolation>> {
        self.within_deadline(async {
            let nodes = self
                .store
                .find_many(&NodeFilter::default(), NodeOrder::Lft, None)
                .await?;
            let violations = integrity::scan_violations(&nodes);

            if violations.is_empty() {
                tracing::info!(nodes = nodes.len(), "Hierarchy validation passed");
            } else {
                tracing::warn!(
                    nodes = nodes.len(),
                    violations = violations.len(),
                    "Hierarchy validation found violations"
                );
            }
            Ok(violations)
        })
        .await
    }

    pub async fn ancestors(&self, id: Uuid) -> Result<Vec<GeoNode>> {
        self.within_deadline(self.query.ancestors(id)).await
    }

    pub async fn descendants(&self, id: Uuid, page: Option<Page>) -> Result<Paged<GeoNode>> {
        self.within_deadline(self.query.descendants(id, page)).await
    }

    pub async fn children(
        &self,
        id: Uuid,
        node_type: Option<GeoNodeType>,
        page: Option<Page>,
    ) -> Result<Paged<GeoNode>> {
        self.within_deadline(self.query.children(id, node_type, page))
            .await
    }

    pub async fn siblings(&self, id: Uuid, page: Option<Page>) -> Result<Paged<GeoNode>> {
        self.within_deadline(self.query.siblings(id, page)).await
    }

    pub async fn roots(&self, page: Option<Page>) -> Result<Paged<GeoNode>> {
        self.within_deadline(self.query.roots(page)).await
    }

    pub async fn leaves(&self, page: Option<Page>) -> Result<Paged<GeoNode>> {
        self.within_deadline(self.query.leaves(page)).await
    }

    pub async fn is_leaf(&self, id: Uuid) -> Result<bool> {
        self.within_deadline(self.query.is_leaf(id)).await
    }

    pub async fn has_children(&self, id: Uuid) -> Result<bool> {
        self.within_deadline(self.query.has_children(id)).await
    }

    pub async fn count_by_type(&self, node_type: GeoNodeType) -> Result<i64> {
        self.within_deadline(self.query.count_by_type(node_type))
            .await
    }

    pub async fn count_children(&self, id: Uuid) -> Result<i64> {
        self.within_deadline(self.query.count_children(id)).await
    }

    pub async fn count_descendants(&self, id: Uuid) -> Result<i64> {
        self.within_deadline(self.query.count_descendants(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::geodirectory::models::ViolationKind;
    use crate::features::geodirectory::services::type_constraints::can_be_child_of;
    use crate::shared::test_helpers::{assert_forest_invariants, memory_service, seed_indonesia};
    use fake::faker::address::en::CityName;
    use fake::Fake;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_create_scenario_and_ancestors() {
        let (service, _) = memory_service();

        let asia = service
            .create(NewGeoNode::new("Asia", GeoNodeType::Continent), None)
            .await
            .unwrap();
        let indonesia = service
            .create(NewGeoNode::new("Indonesia", GeoNodeType::Country), Some(asia.id))
            .await
            .unwrap();
        let west_java = service
            .create(
                NewGeoNode::new("West Java", GeoNodeType::Province),
                Some(indonesia.id),
            )
            .await
            .unwrap();
        let bandung = service
            .create(NewGeoNode::new("Bandung", GeoNodeType::City), Some(west_java.id))
            .await
            .unwrap();

        let ancestors = service.ancestors(bandung.id).await.unwrap();
        let ids: Vec<Uuid> = ancestors.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![asia.id, indonesia.id, west_java.id]);

        let asia = service.get_by_id(asia.id).await.unwrap();
        assert_eq!((asia.lft, asia.rgt), (1, 8));
        assert_eq!(service.count_descendants(asia.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_village_under_country_is_rejected() {
        let (service, store) = memory_service();
        let indonesia = service
            .create(NewGeoNode::new("Indonesia", GeoNodeType::Country), None)
            .await
            .unwrap();

        let err = service
            .create(
                NewGeoNode::new("Cibiru Wetan", GeoNodeType::Village),
                Some(indonesia.id),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GeoError::TypeConstraint {
                child: GeoNodeType::Village,
                parent: Some(GeoNodeType::Country)
            }
        ));
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_move_city_to_other_province() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;

        let moved = service
            .move_node(forest.bandung, Some(forest.central_java))
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(forest.central_java));

        let ancestors = service.ancestors(forest.coblong).await.unwrap();
        let names: Vec<&str> = ancestors.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Asia", "Indonesia", "Jawa Tengah", "Bandung"]);

        let (children, _) = service.children(forest.west_java, None, None).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_forest_invariants(&store.snapshot().await);
    }

    #[tokio::test]
    async fn test_move_into_own_subtree_is_a_cycle() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;
        let before = store.snapshot().await;

        let err = service
            .move_node(forest.indonesia, Some(forest.bandung))
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::Cycle { .. }));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_subtree() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;

        let removed = service.delete(forest.west_java).await.unwrap();
        assert_eq!(removed, 4);
        assert_err!(service.get_by_id(forest.coblong).await);

        let indonesia = service.get_by_id(forest.indonesia).await.unwrap();
        assert_eq!(indonesia.descendant_count(), 1);
        assert_forest_invariants(&store.snapshot().await);
    }

    #[tokio::test]
    async fn test_move_country_to_other_continent() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;

        let moved = service
            .move_node(forest.indonesia, Some(forest.europe))
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(forest.europe));
        assert_eq!(moved.depth, 1);

        let ancestors = service.ancestors(forest.bandung).await.unwrap();
        let ids: Vec<Uuid> = ancestors.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![forest.europe, forest.indonesia, forest.west_java]);

        let (asia_subtree, total) = service.descendants(forest.asia, None).await.unwrap();
        assert!(asia_subtree.is_empty());
        assert_eq!(total, 0);
        assert!(service.is_leaf(forest.asia).await.unwrap());

        let (europe_subtree, _) = service.descendants(forest.europe, None).await.unwrap();
        assert!(europe_subtree.iter().any(|n| n.id == forest.indonesia));
        assert_eq!(europe_subtree.len(), 6);
        assert_forest_invariants(&store.snapshot().await);
    }

    #[tokio::test]
    async fn test_delete_country_removes_every_descendant() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;

        let removed = service.delete(forest.indonesia).await.unwrap();
        assert_eq!(removed, 6);

        for id in [forest.indonesia, forest.west_java, forest.bandung] {
            let err = service.get_by_id(id).await.unwrap_err();
            assert!(matches!(err, GeoError::NotFound(missing) if missing == id));
        }

        let asia = service.get_by_id(forest.asia).await.unwrap();
        assert!(asia.is_leaf());
        assert_forest_invariants(&store.snapshot().await);
    }

    #[tokio::test]
    async fn test_update_changes_attributes_only() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;
        let before = service.get_by_id(forest.bandung).await.unwrap();

        let updated = service
            .update(
                forest.bandung,
                UpdateGeoNode {
                    name: Some("Kota Bandung".to_string()),
                    code: Some(Some("32.73".to_string())),
                    node_type: Some(GeoNodeType::City),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Kota Bandung");
        assert_eq!(updated.code.as_deref(), Some("32.73"));
        assert_eq!((updated.lft, updated.rgt, updated.depth), (before.lft, before.rgt, before.depth));
    }

    #[tokio::test]
    async fn test_update_rejects_structural_changes() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;

        let err = service
            .update(
                forest.bandung,
                UpdateGeoNode {
                    node_type: Some(GeoNodeType::Regency),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::ImmutableField("type")));

        let err = service
            .update(
                forest.bandung,
                UpdateGeoNode {
                    parent_id: Some(Some(forest.central_java)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::ImmutableField("parent_id")));

        // null parent on a child node would detach it
        let err = service
            .update(
                forest.bandung,
                UpdateGeoNode {
                    parent_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::ImmutableField("parent_id")));

        // echoing the current values is accepted
        assert_ok!(
            service
                .update(
                    forest.asia,
                    UpdateGeoNode {
                        parent_id: Some(None),
                        node_type: Some(GeoNodeType::Continent),
                        ..Default::default()
                    },
                )
                .await
        );
    }

    #[tokio::test]
    async fn test_update_clears_optional_attributes() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;

        service
            .update(
                forest.bandung,
                UpdateGeoNode {
                    code: Some(Some("32.73".to_string())),
                    latitude: Some(Some(-6.9)),
                    longitude: Some(Some(107.6)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let cleared = service
            .update(
                forest.bandung,
                UpdateGeoNode {
                    code: Some(None),
                    latitude: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(cleared.code, None);
        assert_eq!(cleared.latitude, None);
        assert_eq!(cleared.longitude, Some(107.6));
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_shift() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;
        let before = store.snapshot().await;

        store.fail_inserts(true);
        let err = service
            .create(
                NewGeoNode::new("Sukajadi", GeoNodeType::District),
                Some(forest.bandung),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::Storage(_)));
        assert_eq!(store.snapshot().await, before);

        store.fail_inserts(false);
        assert_ok!(
            service
                .create(
                    NewGeoNode::new("Sukajadi", GeoNodeType::District),
                    Some(forest.bandung),
                )
                .await
        );
    }

    #[tokio::test]
    async fn test_conflicts_are_retried() {
        let (service, store) = memory_service();
        store.inject_conflicts(2);

        let node = service
            .create(NewGeoNode::new("Asia", GeoNodeType::Continent), None)
            .await
            .unwrap();
        assert_eq!(store.snapshot().await, vec![node]);
    }

    #[tokio::test]
    async fn test_conflict_retries_are_bounded() {
        let (service, store) = memory_service();
        store.inject_conflicts(10);

        let err = service
            .create(NewGeoNode::new("Asia", GeoNodeType::Continent), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::TransactionConflict { attempts: 4 }));
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_expiry_leaves_forest_untouched() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;
        let before = store.snapshot().await;

        store.delay_lock(Duration::from_millis(200));
        let err = service
            .with_timeout(Duration::from_millis(20))
            .delete(forest.asia)
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::DeadlineExceeded(_)));
        assert_eq!(store.snapshot().await, before);
    }

    #[test]
    fn test_caller_deadline_only_tightens() {
        let (service, _) = memory_service();
        let configured = service.settings.operation_timeout;

        let tighter = service.bounded_by(Some(Duration::from_millis(50)));
        assert_eq!(tighter.settings.operation_timeout, Duration::from_millis(50));

        let looser = service.bounded_by(Some(configured * 2));
        assert_eq!(looser.settings.operation_timeout, configured);
        assert_eq!(service.bounded_by(None).settings.operation_timeout, configured);
    }

    #[tokio::test]
    async fn test_rebuild_is_a_fixpoint() {
        let (service, store) = memory_service();
        seed_indonesia(&store).await;
        let before = store.snapshot().await;

        let summary = service.rebuild_nested_set().await.unwrap();
        assert_eq!(summary.nodes, before.len());
        assert_eq!(summary.roots, 2);
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_validate_reports_corruption_then_rebuild_repairs_intervals() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;
        assert!(service.validate_hierarchy().await.unwrap().is_empty());

        let mut bandung = service.get_by_id(forest.bandung).await.unwrap();
        bandung.lft = 90;
        bandung.rgt = 91;
        store.put_raw(bandung).await;

        let violations = service.validate_hierarchy().await.unwrap();
        assert!(violations
            .iter()
            .any(|v| v.node_id == forest.bandung && v.kind == ViolationKind::OutsideParentInterval));

        service.rebuild_nested_set().await.unwrap();
        assert!(service.validate_hierarchy().await.unwrap().is_empty());
        assert_forest_invariants(&store.snapshot().await);
    }

    #[tokio::test]
    async fn test_with_hierarchy_resolves_parent_and_children() {
        let (service, store) = memory_service();
        let forest = seed_indonesia(&store).await;

        let view = service.with_hierarchy(forest.west_java).await.unwrap();
        assert_eq!(view.node.id, forest.west_java);
        assert_eq!(view.parent.map(|p| p.id), Some(forest.indonesia));
        let children: Vec<Uuid> = view.children.iter().map(|c| c.id).collect();
        assert_eq!(children, vec![forest.bandung, forest.bogor]);

        let root = service.with_hierarchy(forest.asia).await.unwrap();
        assert!(root.parent.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_keep_intervals_contiguous() {
        let (service, store) = memory_service();
        let root = service
            .create(NewGeoNode::new("Indonesia", GeoNodeType::Country), None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .create(
                        NewGeoNode::new(format!("Provinsi {}", i), GeoNodeType::Province),
                        Some(root.id),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let forest = store.snapshot().await;
        assert_eq!(forest.len(), 17);
        assert_forest_invariants(&forest);
    }

    fn child_type_for(parent: GeoNodeType, rng: &mut StdRng) -> Option<GeoNodeType> {
        let candidates: Vec<GeoNodeType> = GeoNodeType::ALL
            .into_iter()
            .filter(|t| can_be_child_of(*t, parent))
            .collect();
        candidates.choose(rng).copied()
    }

    #[tokio::test]
    async fn test_random_operations_preserve_invariants() {
        let (service, store) = memory_service();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..3 {
            let name: String = CityName().fake();
            service
                .create(NewGeoNode::new(name, GeoNodeType::Continent), None)
                .await
                .unwrap();
        }

        for step in 0..150 {
            let nodes = store.snapshot().await;
            let roll: u8 = rng.gen_range(0..10);

            if nodes.is_empty() {
                service
                    .create(NewGeoNode::new(CityName().fake::<String>(), GeoNodeType::Country), None)
                    .await
                    .unwrap();
            } else if roll < 6 || nodes.len() < 4 {
                let Some(parent) = nodes.choose(&mut rng) else {
                    continue;
                };
                let Some(node_type) = child_type_for(parent.node_type, &mut rng) else {
                    continue;
                };
                let name: String = CityName().fake();
                service
                    .create(NewGeoNode::new(name, node_type), Some(parent.id))
                    .await
                    .unwrap();
            } else if roll < 9 {
                let (Some(node), Some(target)) = (nodes.choose(&mut rng), nodes.choose(&mut rng))
                else {
                    continue;
                };
                match service.move_node(node.id, Some(target.id)).await {
                    Ok(_)
                    | Err(GeoError::Cycle { .. })
                    | Err(GeoError::TypeConstraint { .. }) => {}
                    Err(e) => panic!("step {}: unexpected move error {:?}", step, e),
                }
            } else if let Some(victim) = nodes.choose(&mut rng) {
                let expected = victim.descendant_count() as u64 + 1;
                assert_eq!(service.delete(victim.id).await.unwrap(), expected);
            }

            let forest = store.snapshot().await;
            assert_forest_invariants(&forest);

            let before_rebuild = forest.clone();
            service.rebuild_nested_set().await.unwrap();
            let rebuilt = store.snapshot().await;
            let intervals = |nodes: &[GeoNode]| -> Vec<(Uuid, i32, i32, i32)> {
                nodes.iter().map(|n| (n.id, n.lft, n.rgt, n.depth)).collect()
            };
            assert_eq!(intervals(&rebuilt), intervals(&before_rebuild), "step {}", step);
        }
    }

    #[tokio::test]
    async fn test_reads_report_missing_nodes() {
        let (service, _store) = memory_service();
        let missing = Uuid::new_v4();

        assert!(matches!(service.get_by_id(missing).await, Err(GeoError::NotFound(_))));
        assert!(matches!(service.delete(missing).await, Err(GeoError::NotFound(_))));
        assert!(matches!(
            service.move_node(missing, None).await,
            Err(GeoError::NotFound(_))
        ));
    }
}
