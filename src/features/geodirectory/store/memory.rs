//! In-memory store used by the test suite.
//!
//! A transaction works on a private copy of the committed map and swaps it in
//! on commit, so dropping it discards every change. The forest lock is a tokio
//! mutex; after it is acquired the working copy is refreshed from the latest
//! committed state, which mirrors READ COMMITTED behind an advisory lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::features::geodirectory::error::GeoError;
use crate::features::geodirectory::models::{GeoNode, GeoNodeAttributes, NodePosition};
use crate::features::geodirectory::store::{
    GeoNodeStore, GeoNodeTx, NodeFilter, NodeOrder, Page, StoreResult,
};

type NodeMap = HashMap<Uuid, GeoNode>;

#[derive(Default)]
struct Faults {
    fail_inserts: AtomicBool,
    conflicts_on_commit: AtomicU32,
    lock_delay_ms: AtomicU64,
}

#[derive(Clone, Default)]
pub struct MemoryGeoNodeStore {
    committed: Arc<RwLock<NodeMap>>,
    forest_lock: Arc<Mutex<()>>,
    faults: Arc<Faults>,
}

fn sort_nodes(nodes: &mut [GeoNode], order: NodeOrder) {
    match order {
        NodeOrder::Lft => nodes.sort_by_key(|n| n.lft),
        NodeOrder::Depth => nodes.sort_by_key(|n| (n.depth, n.lft)),
        NodeOrder::Sibling => nodes.sort_by(|a, b| {
            a.ordering
                .cmp(&b.ordering)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        }),
    }
}

impl MemoryGeoNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every transactional insert fail with a storage error
    pub fn fail_inserts(&self, enabled: bool) {
        self.faults.fail_inserts.store(enabled, Ordering::SeqCst);
    }

    /// Make the next `count` commits fail with a transaction conflict
    pub fn inject_conflicts(&self, count: u32) {
        self.faults
            .conflicts_on_commit
            .store(count, Ordering::SeqCst);
    }

    /// Sleep this long before granting the forest lock
    pub fn delay_lock(&self, delay: Duration) {
        self.faults
            .lock_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Committed nodes in pre-order
    pub async fn snapshot(&self) -> Vec<GeoNode> {
        let mut nodes: Vec<GeoNode> = self.committed.read().await.values().cloned().collect();
        sort_nodes(&mut nodes, NodeOrder::Lft);
        nodes
    }

    /// Write a row as-is, bypassing the maintainer (simulates a bulk import)
    pub async fn put_raw(&self, node: GeoNode) {
        self.committed.write().await.insert(node.id, node);
    }
}

#[async_trait]
impl GeoNodeStore for MemoryGeoNodeStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<GeoNode>> {
        Ok(self.committed.read().await.get(&id).cloned())
    }

    async fn find_many(
        &self,
        filter: &NodeFilter,
        order: NodeOrder,
        page: Option<Page>,
    ) -> StoreResult<Vec<GeoNode>> {
        let mut nodes: Vec<GeoNode> = self
            .committed
            .read()
            .await
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        sort_nodes(&mut nodes, order);

        Ok(match page {
            Some(page) => nodes
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect(),
            None => nodes,
        })
    }

    async fn count(&self, filter: &NodeFilter) -> StoreResult<i64> {
        let committed = self.committed.read().await;
        Ok(committed.values().filter(|n| filter.matches(n)).count() as i64)
    }

    async fn update_attributes(
        &self,
        id: Uuid,
        attrs: &GeoNodeAttributes,
    ) -> StoreResult<Option<GeoNode>> {
        let mut committed = self.committed.write().await;
        Ok(committed.get_mut(&id).map(|node| {
            node.name = attrs.name.clone();
            node.code = attrs.code.clone();
            node.postal_code = attrs.postal_code.clone();
            node.latitude = attrs.latitude;
            node.longitude = attrs.longitude;
            node.updated_at = Utc::now();
            node.clone()
        }))
    }

    async fn begin(&self) -> StoreResult<Box<dyn GeoNodeTx>> {
        let working = self.committed.read().await.clone();
        Ok(Box::new(MemoryGeoNodeTx {
            store: self.clone(),
            working,
            _guard: None,
        }))
    }
}

pub struct MemoryGeoNodeTx {
    store: MemoryGeoNodeStore,
    working: NodeMap,
    _guard: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl GeoNodeTx for MemoryGeoNodeTx {
    async fn lock_forest(&mut self) -> StoreResult<()> {
        let delay = self.store.faults.lock_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let guard = Arc::clone(&self.store.forest_lock).lock_owned().await;
        self.working = self.store.committed.read().await.clone();
        self._guard = Some(guard);
        Ok(())
    }

    async fn find_by_id(&mut self, id: Uuid) -> StoreResult<Option<GeoNode>> {
        Ok(self.working.get(&id).cloned())
    }

    async fn max_root_rgt(&mut self) -> StoreResult<Option<i32>> {
        Ok(self
            .working
            .values()
            .filter(|n| n.parent_id.is_none())
            .map(|n| n.rgt)
            .max())
    }

    async fn max_child_ordering(&mut self, parent_id: Option<Uuid>) -> StoreResult<Option<i32>> {
        Ok(self
            .working
            .values()
            .filter(|n| n.parent_id == parent_id)
            .map(|n| n.ordering)
            .max())
    }

    async fn shift_bounds(&mut self, from: i32, delta: i32) -> StoreResult<u64> {
        let mut affected = 0;
        for node in self.working.values_mut().filter(|n| n.rgt >= from) {
            if node.lft >= from {
                node.lft += delta;
            }
            node.rgt += delta;
            affected += 1;
        }
        Ok(affected)
    }

    async fn shift_range(
        &mut self,
        lo: i32,
        hi: i32,
        delta: i32,
        depth_delta: i32,
    ) -> StoreResult<u64> {
        let mut affected = 0;
        for node in self
            .working
            .values_mut()
            .filter(|n| n.lft >= lo && n.rgt <= hi)
        {
            node.lft += delta;
            node.rgt += delta;
            node.depth += depth_delta;
            affected += 1;
        }
        Ok(affected)
    }

    async fn insert(&mut self, node: &GeoNode) -> StoreResult<()> {
        if self.store.faults.fail_inserts.load(Ordering::SeqCst) {
            return Err(GeoError::Storage(sqlx::Error::Protocol(
                "injected insert failure".to_string(),
            )));
        }
        self.working.insert(node.id, node.clone());
        Ok(())
    }

    async fn set_parent(
        &mut self,
        id: Uuid,
        parent_id: Option<Uuid>,
        ordering: i32,
    ) -> StoreResult<()> {
        if let Some(node) = self.working.get_mut(&id) {
            node.parent_id = parent_id;
            node.ordering = ordering;
        }
        Ok(())
    }

    async fn delete_range(&mut self, lo: i32, hi: i32) -> StoreResult<u64> {
        let before = self.working.len();
        self.working.retain(|_, n| !(n.lft >= lo && n.rgt <= hi));
        Ok((before - self.working.len()) as u64)
    }

    async fn load_forest(&mut self) -> StoreResult<Vec<GeoNode>> {
        Ok(self.working.values().cloned().collect())
    }

    async fn write_positions(&mut self, positions: &[NodePosition]) -> StoreResult<()> {
        for position in positions {
            if let Some(node) = self.working.get_mut(&position.id) {
                node.lft = position.lft;
                node.rgt = position.rgt;
                node.depth = position.depth;
                node.ordering = position.ordering;
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let conflicted = self
            .store
            .faults
            .conflicts_on_commit
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            return Err(GeoError::TransactionConflict { attempts: 1 });
        }

        let MemoryGeoNodeTx {
            store,
            working,
            _guard,
        } = *self;
        *store.committed.write().await = working;
        Ok(())
    }
}
