//! In-memory order cache
//!
//! [`OrderCache`] maps order ids to order aggregates. It is created once at startup and cloned into every component
//! that needs it; clones share the same underlying map.
//!
//! Reads (`get`, `size`, `snapshot`) hold a shared lock and may run concurrently. Writes (`set`, `load`) hold the
//! exclusive lock. `load` builds the replacement map before taking the lock and swaps it in one step, so a reader
//! sees either the old contents or the new contents, never a mix.
//!
//! Entries are never evicted.
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use log::*;

use crate::db_types::{Order, OrderId};

type OrderMap = HashMap<OrderId, Arc<Order>>;

#[derive(Clone, Default)]
pub struct OrderCache {
    orders: Arc<RwLock<OrderMap>>,
}

impl std::fmt::Debug for OrderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderCache ({} orders)", self.size())
    }
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the order, replacing any existing entry for the same id. Returns the shared handle that was stored.
    pub fn set(&self, order_id: OrderId, order: Order) -> Arc<Order> {
        let order = Arc::new(order);
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        orders.insert(order_id, Arc::clone(&order));
        order
    }

    pub fn get(&self, order_id: &OrderId) -> Option<Arc<Order>> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        orders.get(order_id).cloned()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        orders.contains_key(order_id)
    }

    pub fn size(&self) -> usize {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        orders.len()
    }

    /// A point-in-time copy of every cache entry.
    pub fn snapshot(&self) -> HashMap<OrderId, Arc<Order>> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        orders.clone()
    }

    /// Sorted list of the cached order ids.
    pub fn order_ids(&self) -> Vec<OrderId> {
        let mut ids = self.snapshot().into_keys().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Replaces the entire cache contents with `orders`. Previous entries that are not in `orders` are gone afterwards.
    pub fn load<I>(&self, orders: I)
    where I: IntoIterator<Item = Order> {
        let replacement =
            orders.into_iter().map(|o| (o.order_uid.clone(), Arc::new(o))).collect::<OrderMap>();
        let count = replacement.len();
        {
            let mut current = self.orders.write().unwrap_or_else(PoisonError::into_inner);
            *current = replacement;
        }
        info!("🧠️ Cache loaded with {count} orders");
    }
}
