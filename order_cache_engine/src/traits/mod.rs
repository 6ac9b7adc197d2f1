//! # Storage backend contracts
//!
//! This module defines the behaviour a durable store must expose in order to back the order cache engine.
//!
//! * [`OrderStore`] persists the order aggregate atomically, reconstructs single orders, and enumerates every stored
//!   order for cache rehydration.
mod order_store;

pub use order_store::{OrderStore, OrderStoreError};
