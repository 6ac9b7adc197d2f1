//! Order Cache Engine
//!
//! The order cache engine ingests order records from a message stream, stores them durably, and keeps an in-memory
//! cache of every known order so that reads are served without a database round trip.
//!
//! The library is divided into these sections:
//! 1. Storage (`db` and [`traits`]). SQLite is the bundled backend. Other backends need to implement
//!    [`OrderStore`]. The data types that are stored are defined in [`db_types`] and are public.
//! 2. The in-memory cache ([`cache`]), shared between the ingestion and read paths.
//! 3. The ingestion pipeline ([`consumer`]). It is transport-agnostic; a broker adapter implements
//!    [`MessageSource`] and, optionally, [`DeadLetterSink`].
//! 4. The read-side API ([`mod@oce_api`]): cache-first order lookups and startup rehydration.
mod db;

pub mod cache;
pub mod consumer;
pub mod db_types;
pub mod oce_api;
pub mod traits;
pub mod validation;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use cache::OrderCache;
pub use consumer::{
    DeadLetterSink,
    DeliveryPolicy,
    DiscardDeadLetters,
    IngestError,
    MessageSource,
    OrderConsumer,
    StreamError,
    StreamMessage,
};
#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use oce_api::{
    errors::OrderQueryError,
    query_api::{CacheStats, OrderQueryApi},
    rehydration::rehydrate_cache,
};
pub use traits::{OrderStore, OrderStoreError};
