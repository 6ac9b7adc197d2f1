use std::{fmt::Debug, sync::Arc};

use log::*;
use serde::{Deserialize, Serialize};

use super::errors::OrderQueryError;
use crate::{
    cache::OrderCache,
    db_types::{Order, OrderId},
    traits::OrderStore,
};

/// Cache contents summary, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub cache_size: usize,
    pub orders: Vec<OrderId>,
}

/// `OrderQueryApi` is the read path for orders. It checks the cache first and only consults the store on a miss.
///
/// There is no negative caching: a lookup for an id that does not exist goes to the store every time.
#[derive(Clone)]
pub struct OrderQueryApi<B> {
    db: B,
    cache: OrderCache,
}

impl<B> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi")
    }
}

impl<B> OrderQueryApi<B> {
    pub fn new(db: B, cache: OrderCache) -> Self {
        Self { db, cache }
    }

    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        let orders = self.cache.order_ids();
        CacheStats { cache_size: orders.len(), orders }
    }
}

impl<B> OrderQueryApi<B>
where B: OrderStore
{
    /// Fetches the order for `order_id`.
    ///
    /// * A cache hit is returned immediately, without touching the store.
    /// * On a miss, the order is loaded from the store. If it exists, it is added to the cache before being returned.
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Arc<Order>, OrderQueryError> {
        if let Some(order) = self.cache.get(order_id) {
            debug!("🔍️ Cache hit for order [{order_id}]");
            return Ok(order);
        }
        debug!("🔍️ Cache miss for order [{order_id}]");
        let order = self.db.fetch_order(order_id).await.map_err(|e| {
            if !e.is_not_found() {
                error!("🔍️ Could not fetch order [{order_id}] from the store. {e}");
            }
            OrderQueryError::from(e)
        })?;
        let order = self.cache.set(order_id.clone(), order);
        debug!("🔍️ Order [{order_id}] loaded from the store and cached");
        Ok(order)
    }
}
