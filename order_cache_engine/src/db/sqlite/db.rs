use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::SqlitePool;

use super::{new_pool, orders};
use crate::{
    db_types::{Order, OrderId},
    traits::{OrderStore, OrderStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, OrderStoreError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the order tables if they do not exist yet.
    pub async fn create_schema(&self) -> Result<(), OrderStoreError> {
        sqlx::migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrderStoreError::MigrationError(e.to_string()))?;
        debug!("🗃️ Order schema is up to date");
        Ok(())
    }

    /// Closes every connection in the pool. Pending acquisitions fail once this has been called.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("🗃️ Connection pool closed");
    }

}

impl OrderStore for SqliteDatabase {
    async fn save_order(&self, order: &Order) -> Result<(), OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let oid = &order.order_uid;
        let new_header = orders::insert_header_if_absent(order, Utc::now(), &mut tx).await?;
        if !new_header {
            debug!("🗃️ Order [{oid}] already has a header record. Header left unchanged");
        }
        orders::insert_delivery_if_absent(oid, &order.delivery, &mut tx).await?;
        orders::insert_payment_if_absent(oid, &order.payment, &mut tx).await?;
        for item in &order.items {
            orders::append_item(oid, item, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Order [{oid}] has been saved with {} items", order.items.len());
        Ok(())
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await?.ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))
    }

    async fn fetch_all_orders(&self) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let ids = orders::fetch_order_ids(&mut conn).await?;
        trace!("🗃️ {} order ids found", ids.len());
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            match orders::fetch_order(&id, &mut conn).await {
                Ok(Some(order)) => result.push(order),
                Ok(None) => warn!("🗃️ Order [{id}] disappeared while loading all orders. Skipping it"),
                Err(e) => warn!("🗃️ Could not load order [{id}]. Skipping it. {e}"),
            }
        }
        debug!("🗃️ Loaded {} orders", result.len());
        Ok(result)
    }
}
