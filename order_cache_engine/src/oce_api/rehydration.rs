use log::*;

use crate::{
    cache::OrderCache,
    traits::{OrderStore, OrderStoreError},
};

/// Loads every stored order into the cache, replacing its contents. Returns the number of orders loaded.
///
/// Run this once at startup, before reads are served. Orders the store cannot reconstruct are skipped by the store.
/// If the store cannot enumerate orders at all, the cache is left untouched and the error is returned; callers are
/// expected to log it and carry on with whatever the cache holds.
pub async fn rehydrate_cache<B: OrderStore>(db: &B, cache: &OrderCache) -> Result<usize, OrderStoreError> {
    info!("🧠️ Loading the order cache from the store");
    let orders = db.fetch_all_orders().await?;
    let count = orders.len();
    cache.load(orders);
    Ok(count)
}
