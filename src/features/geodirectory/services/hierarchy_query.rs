//! Read-only hierarchy queries expressed as interval predicates.
//!
//! Ancestors of `n` are the nodes whose interval strictly encloses
//! `[n.lft, n.rgt]`; descendants are the nodes strictly inside it. Only the
//! direct-child and sibling scans use `parent_id`.

use std::sync::Arc;

use uuid::Uuid;

use crate::features::geodirectory::error::GeoError;
use crate::features::geodirectory::models::{GeoNode, GeoNodeType};
use crate::features::geodirectory::store::{GeoNodeStore, NodeFilter, NodeOrder, Page, ParentScope};

pub type Paged<T> = (Vec<T>, i64);

fn ancestors_filter(node: &GeoNode) -> NodeFilter {
    NodeFilter {
        lft_lt: Some(node.lft),
        rgt_gt: Some(node.rgt),
        ..Default::default()
    }
}

fn descendants_filter(node: &GeoNode) -> NodeFilter {
    NodeFilter {
        lft_gt: Some(node.lft),
        rgt_lt: Some(node.rgt),
        ..Default::default()
    }
}

fn children_filter(node: &GeoNode, node_type: Option<GeoNodeType>) -> NodeFilter {
    NodeFilter {
        parent: Some(ParentScope::Of(node.id)),
        node_type,
        ..Default::default()
    }
}

fn siblings_filter(node: &GeoNode) -> NodeFilter {
    NodeFilter {
        parent: Some(match node.parent_id {
            Some(pid) => ParentScope::Of(pid),
            None => ParentScope::Root,
        }),
        exclude_id: Some(node.id),
        ..Default::default()
    }
}

#[derive(Clone)]
pub struct HierarchyQuery {
    store: Arc<dyn GeoNodeStore>,
}

impl HierarchyQuery {
    pub fn new(store: Arc<dyn GeoNodeStore>) -> Self {
        Self { store }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<GeoNode, GeoError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(GeoError::NotFound(id))
    }

    async fn list(
        &self,
        filter: NodeFilter,
        order: NodeOrder,
        page: Option<Page>,
    ) -> Result<Paged<GeoNode>, GeoError> {
        let nodes = self.store.find_many(&filter, order, page).await?;
        let total = match page {
            Some(_) => self.store.count(&filter).await?,
            None => nodes.len() as i64,
        };
        Ok((nodes, total))
    }

    /// Root first, ending with the direct parent
    pub async fn ancestors(&self, id: Uuid) -> Result<Vec<GeoNode>, GeoError> {
        let node = self.get_by_id(id).await?;
        self.store
            .find_many(&ancestors_filter(&node), NodeOrder::Depth, None)
            .await
    }

    /// Whole subtree below the node, in pre-order
    pub async fn descendants(&self, id: Uuid, page: Option<Page>) -> Result<Paged<GeoNode>, GeoError> {
        let node = self.get_by_id(id).await?;
        self.list(descendants_filter(&node), NodeOrder::Lft, page)
            .await
    }

    pub async fn children(
        &self,
        id: Uuid,
        node_type: Option<GeoNodeType>,
        page: Option<Page>,
    ) -> Result<Paged<GeoNode>, GeoError> {
        let node = self.get_by_id(id).await?;
        self.children_of(&node, node_type, page).await
    }

    pub async fn children_of(
        &self,
        node: &GeoNode,
        node_type: Option<GeoNodeType>,
        page: Option<Page>,
    ) -> Result<Paged<GeoNode>, GeoError> {
        self.list(children_filter(node, node_type), NodeOrder::Sibling, page)
            .await
    }

    /// Nodes sharing the same parent (other roots for a root), excluding itself
    pub async fn siblings(&self, id: Uuid, page: Option<Page>) -> Result<Paged<GeoNode>, GeoError> {
        let node = self.get_by_id(id).await?;
        self.list(siblings_filter(&node), NodeOrder::Sibling, page)
            .await
    }

    pub async fn roots(&self, page: Option<Page>) -> Result<Paged<GeoNode>, GeoError> {
        let filter = NodeFilter {
            parent: Some(ParentScope::Root),
            ..Default::default()
        };
        self.list(filter, NodeOrder::Lft, page).await
    }

    pub async fn leaves(&self, page: Option<Page>) -> Result<Paged<GeoNode>, GeoError> {
        let filter = NodeFilter {
            leaves_only: true,
            ..Default::default()
        };
        self.list(filter, NodeOrder::Lft, page).await
    }

    pub async fn is_leaf(&self, id: Uuid) -> Result<bool, GeoError> {
        Ok(self.get_by_id(id).await?.is_leaf())
    }

    pub async fn has_children(&self, id: Uuid) -> Result<bool, GeoError> {
        Ok(!self.is_leaf(id).await?)
    }

    pub async fn count_by_type(&self, node_type: GeoNodeType) -> Result<i64, GeoError> {
        let filter = NodeFilter {
            node_type: Some(node_type),
            ..Default::default()
        };
        self.store.count(&filter).await
    }

    pub async fn count_children(&self, id: Uuid) -> Result<i64, GeoError> {
        let node = self.get_by_id(id).await?;
        self.store.count(&children_filter(&node, None)).await
    }

    /// Derived from the interval width alone
    pub async fn count_descendants(&self, id: Uuid) -> Result<i64, GeoError> {
        Ok(self.get_by_id(id).await?.descendant_count())
    }
}
