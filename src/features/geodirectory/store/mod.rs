//! Backing store contract for the geodirectory forest.
//!
//! Reads go through [`GeoNodeStore`] directly. Structural mutations open a
//! [`GeoNodeTx`], take the forest lock and issue interval shifts; dropping a
//! transaction without calling `commit` rolls it back.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::features::geodirectory::error::GeoError;
use crate::features::geodirectory::models::{GeoNode, GeoNodeAttributes, GeoNodeType, NodePosition};

pub use postgres::PgGeoNodeStore;

pub type StoreResult<T> = std::result::Result<T, GeoError>;

/// Which parent a scan is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentScope {
    Root,
    Of(Uuid),
}

/// Conjunction of predicates over the nested-set columns.
/// An empty filter matches every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilter {
    pub lft_gt: Option<i32>,
    pub lft_lt: Option<i32>,
    pub rgt_gt: Option<i32>,
    pub rgt_lt: Option<i32>,
    pub parent: Option<ParentScope>,
    pub node_type: Option<GeoNodeType>,
    pub leaves_only: bool,
    pub exclude_id: Option<Uuid>,
}

#[cfg(test)]
impl NodeFilter {
    /// In-process evaluation of the filter, mirroring the SQL predicates
    pub fn matches(&self, node: &GeoNode) -> bool {
        self.lft_gt.map_or(true, |v| node.lft > v)
            && self.lft_lt.map_or(true, |v| node.lft < v)
            && self.rgt_gt.map_or(true, |v| node.rgt > v)
            && self.rgt_lt.map_or(true, |v| node.rgt < v)
            && self.parent.map_or(true, |scope| match scope {
                ParentScope::Root => node.parent_id.is_none(),
                ParentScope::Of(id) => node.parent_id == Some(id),
            })
            && self.node_type.map_or(true, |t| node.node_type == t)
            && (!self.leaves_only || node.rgt - node.lft == 1)
            && self.exclude_id.map_or(true, |id| node.id != id)
    }
}

/// Sort order for scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrder {
    /// Pre-order (`lft` ascending)
    Lft,
    /// Root first (`depth`, then `lft`)
    Depth,
    /// Sibling order (`ordering`, then `name`, then `id`)
    Sibling,
}

/// Limit/offset window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.max(0),
            offset: offset.max(0),
        }
    }
}

#[async_trait]
pub trait GeoNodeStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<GeoNode>>;

    async fn find_many(
        &self,
        filter: &NodeFilter,
        order: NodeOrder,
        page: Option<Page>,
    ) -> StoreResult<Vec<GeoNode>>;

    async fn count(&self, filter: &NodeFilter) -> StoreResult<i64>;

    /// Overwrite the non-structural columns; `None` when the node is absent
    async fn update_attributes(
        &self,
        id: Uuid,
        attrs: &GeoNodeAttributes,
    ) -> StoreResult<Option<GeoNode>>;

    async fn begin(&self) -> StoreResult<Box<dyn GeoNodeTx>>;
}

/// One structural transaction against the forest
#[async_trait]
pub trait GeoNodeTx: Send {
    /// Serialize against every other structural transaction until commit/rollback
    async fn lock_forest(&mut self) -> StoreResult<()>;

    async fn find_by_id(&mut self, id: Uuid) -> StoreResult<Option<GeoNode>>;

    /// Largest `rgt` among root nodes, `None` for an empty forest
    async fn max_root_rgt(&mut self) -> StoreResult<Option<i32>>;

    /// Largest `ordering` among the children of `parent_id` (roots for `None`)
    async fn max_child_ordering(&mut self, parent_id: Option<Uuid>) -> StoreResult<Option<i32>>;

    /// Add `delta` to every `lft >= from` and every `rgt >= from`
    async fn shift_bounds(&mut self, from: i32, delta: i32) -> StoreResult<u64>;

    /// Add `delta` to both bounds and `depth_delta` to the depth of every row
    /// with `lft >= lo` and `rgt <= hi`
    async fn shift_range(&mut self, lo: i32, hi: i32, delta: i32, depth_delta: i32)
        -> StoreResult<u64>;

    async fn insert(&mut self, node: &GeoNode) -> StoreResult<()>;

    async fn set_parent(
        &mut self,
        id: Uuid,
        parent_id: Option<Uuid>,
        ordering: i32,
    ) -> StoreResult<()>;

    /// Delete every row with `lft >= lo` and `rgt <= hi`
    async fn delete_range(&mut self, lo: i32, hi: i32) -> StoreResult<u64>;

    /// Every node, in no particular order
    async fn load_forest(&mut self) -> StoreResult<Vec<GeoNode>>;

    async fn write_positions(&mut self, positions: &[NodePosition]) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
