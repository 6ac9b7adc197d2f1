//! # Order cache engine public API
//!
//! * [`query_api`] serves order reads cache-first, falling back to the store and backfilling the cache on a miss.
//! * [`rehydration`] loads every stored order into the cache at startup.
//!
//! The ingestion side lives in [`crate::consumer`].
//!
//! # API usage
//!
//! An API instance is created by supplying a store backend and the shared cache:
//!
//! ```rust,ignore
//! use order_cache_engine::{OrderCache, OrderQueryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let cache = OrderCache::new();
//! let api = OrderQueryApi::new(db, cache);
//! let order = api.fetch_order(&order_id).await?;
//! ```

pub mod errors;
pub mod query_api;
pub mod rehydration;
