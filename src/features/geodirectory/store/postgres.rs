use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::features::geodirectory::error::GeoError;
use crate::features::geodirectory::models::{GeoNode, GeoNodeAttributes, NodePosition};
use crate::features::geodirectory::store::{
    GeoNodeStore, GeoNodeTx, NodeFilter, NodeOrder, Page, ParentScope, StoreResult,
};

const SELECT_GEO_NODES: &str = r#"
    SELECT id, name, node_type, code, postal_code, latitude, longitude,
           parent_id, lft, rgt, depth, ordering, created_at, updated_at
    FROM geo_nodes"#;

/// Log a database failure and classify it for the retry loop
fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> GeoError {
    move |e| {
        tracing::error!("Failed to {}: {:?}", context, e);
        GeoError::from_db(e)
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &NodeFilter) {
    qb.push(" WHERE TRUE");

    if let Some(v) = filter.lft_gt {
        qb.push(" AND lft > ").push_bind(v);
    }
    if let Some(v) = filter.lft_lt {
        qb.push(" AND lft < ").push_bind(v);
    }
    if let Some(v) = filter.rgt_gt {
        qb.push(" AND rgt > ").push_bind(v);
    }
    if let Some(v) = filter.rgt_lt {
        qb.push(" AND rgt < ").push_bind(v);
    }
    match filter.parent {
        Some(ParentScope::Root) => {
            qb.push(" AND parent_id IS NULL");
        }
        Some(ParentScope::Of(parent_id)) => {
            qb.push(" AND parent_id = ").push_bind(parent_id);
        }
        None => {}
    }
    if let Some(node_type) = filter.node_type {
        qb.push(" AND node_type = ").push_bind(node_type);
    }
    if filter.leaves_only {
        qb.push(" AND rgt - lft = 1");
    }
    if let Some(id) = filter.exclude_id {
        qb.push(" AND id <> ").push_bind(id);
    }
}

fn order_clause(order: NodeOrder) -> &'static str {
    match order {
        NodeOrder::Lft => " ORDER BY lft ASC",
        NodeOrder::Depth => " ORDER BY depth ASC, lft ASC",
        NodeOrder::Sibling => " ORDER BY ordering ASC, name ASC, id ASC",
    }
}

/// PostgreSQL-backed geodirectory store
pub struct PgGeoNodeStore {
    pool: PgPool,
    forest_lock_key: i64,
}

impl PgGeoNodeStore {
    pub fn new(pool: PgPool, forest_lock_key: i64) -> Self {
        Self {
            pool,
            forest_lock_key,
        }
    }
}

#[async_trait]
impl GeoNodeStore for PgGeoNodeStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<GeoNode>> {
        let sql = format!("{} WHERE id = $1", SELECT_GEO_NODES);
        sqlx::query_as::<_, GeoNode>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch geo node by id"))
    }

    async fn find_many(
        &self,
        filter: &NodeFilter,
        order: NodeOrder,
        page: Option<Page>,
    ) -> StoreResult<Vec<GeoNode>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_GEO_NODES);
        push_filter(&mut qb, filter);
        qb.push(order_clause(order));
        if let Some(page) = page {
            qb.push(" LIMIT ")
                .push_bind(page.limit)
                .push(" OFFSET ")
                .push_bind(page.offset);
        }

        qb.build_query_as::<GeoNode>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list geo nodes"))
    }

    async fn count(&self, filter: &NodeFilter) -> StoreResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM geo_nodes");
        push_filter(&mut qb, filter);

        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count geo nodes"))
    }

    async fn update_attributes(
        &self,
        id: Uuid,
        attrs: &GeoNodeAttributes,
    ) -> StoreResult<Option<GeoNode>> {
        sqlx::query_as::<_, GeoNode>(
            r#"
            UPDATE geo_nodes
            SET name = $2, code = $3, postal_code = $4, latitude = $5, longitude = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, node_type, code, postal_code, latitude, longitude,
                      parent_id, lft, rgt, depth, ordering, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&attrs.name)
        .bind(&attrs.code)
        .bind(&attrs.postal_code)
        .bind(attrs.latitude)
        .bind(attrs.longitude)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update geo node attributes"))
    }

    async fn begin(&self) -> StoreResult<Box<dyn GeoNodeTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin structural transaction"))?;

        Ok(Box::new(PgGeoNodeTx {
            tx,
            forest_lock_key: self.forest_lock_key,
        }))
    }
}

/// Structural transaction; rolls back when dropped without `commit`
pub struct PgGeoNodeTx {
    tx: Transaction<'static, Postgres>,
    forest_lock_key: i64,
}

#[async_trait]
impl GeoNodeTx for PgGeoNodeTx {
    async fn lock_forest(&mut self) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(self.forest_lock_key)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("acquire forest lock"))?;
        Ok(())
    }

    async fn find_by_id(&mut self, id: Uuid) -> StoreResult<Option<GeoNode>> {
        let sql = format!("{} WHERE id = $1", SELECT_GEO_NODES);
        sqlx::query_as::<_, GeoNode>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("fetch geo node by id"))
    }

    async fn max_root_rgt(&mut self) -> StoreResult<Option<i32>> {
        sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(rgt) FROM geo_nodes WHERE parent_id IS NULL",
        )
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error("read max root bound"))
    }

    async fn max_child_ordering(&mut self, parent_id: Option<Uuid>) -> StoreResult<Option<i32>> {
        sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(ordering) FROM geo_nodes WHERE parent_id IS NOT DISTINCT FROM $1",
        )
        .bind(parent_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error("read max sibling ordering"))
    }

    async fn shift_bounds(&mut self, from: i32, delta: i32) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE geo_nodes
            SET lft = CASE WHEN lft >= $1 THEN lft + $2 ELSE lft END,
                rgt = rgt + $2,
                updated_at = NOW()
            WHERE rgt >= $1
            "#,
        )
        .bind(from)
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("shift interval bounds"))?;

        Ok(result.rows_affected())
    }

    async fn shift_range(
        &mut self,
        lo: i32,
        hi: i32,
        delta: i32,
        depth_delta: i32,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE geo_nodes
            SET lft = lft + $3, rgt = rgt + $3, depth = depth + $4, updated_at = NOW()
            WHERE lft >= $1 AND rgt <= $2
            "#,
        )
        .bind(lo)
        .bind(hi)
        .bind(delta)
        .bind(depth_delta)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("shift subtree interval"))?;

        Ok(result.rows_affected())
    }

    async fn insert(&mut self, node: &GeoNode) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO geo_nodes (
                id, name, node_type, code, postal_code, latitude, longitude,
                parent_id, lft, rgt, depth, ordering, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(node.id)
        .bind(&node.name)
        .bind(node.node_type)
        .bind(&node.code)
        .bind(&node.postal_code)
        .bind(node.latitude)
        .bind(node.longitude)
        .bind(node.parent_id)
        .bind(node.lft)
        .bind(node.rgt)
        .bind(node.depth)
        .bind(node.ordering)
        .bind(node.created_at)
        .bind(node.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("insert geo node"))?;

        Ok(())
    }

    async fn set_parent(
        &mut self,
        id: Uuid,
        parent_id: Option<Uuid>,
        ordering: i32,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE geo_nodes SET parent_id = $2, ordering = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(parent_id)
        .bind(ordering)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("re-parent geo node"))?;

        Ok(())
    }

    async fn delete_range(&mut self, lo: i32, hi: i32) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM geo_nodes WHERE lft >= $1 AND rgt <= $2")
            .bind(lo)
            .bind(hi)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("delete geo subtree"))?;

        Ok(result.rows_affected())
    }

    async fn load_forest(&mut self) -> StoreResult<Vec<GeoNode>> {
        sqlx::query_as::<_, GeoNode>(SELECT_GEO_NODES)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("load geo forest"))
    }

    async fn write_positions(&mut self, positions: &[NodePosition]) -> StoreResult<()> {
        if positions.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = positions.iter().map(|p| p.id).collect();
        let lfts: Vec<i32> = positions.iter().map(|p| p.lft).collect();
        let rgts: Vec<i32> = positions.iter().map(|p| p.rgt).collect();
        let depths: Vec<i32> = positions.iter().map(|p| p.depth).collect();
        let orderings: Vec<i32> = positions.iter().map(|p| p.ordering).collect();

        sqlx::query(
            r#"
            UPDATE geo_nodes AS g
            SET lft = v.lft, rgt = v.rgt, depth = v.depth, ordering = v.ordering,
                updated_at = NOW()
            FROM UNNEST($1::uuid[], $2::int4[], $3::int4[], $4::int4[], $5::int4[])
                AS v(id, lft, rgt, depth, ordering)
            WHERE g.id = v.id
            "#,
        )
        .bind(ids)
        .bind(lfts)
        .bind(rgts)
        .bind(depths)
        .bind(orderings)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("write rebuilt positions"))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(db_error("commit structural transaction"))
    }
}
