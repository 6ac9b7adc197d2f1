//! # SQLite backend
//!
//! The low-level queries live in [`orders`] as plain functions that accept a `&mut SqliteConnection`. Callers can
//! obtain a connection from the pool, or open a transaction and pass `&mut *tx`, without any other changes.
//! [`SqliteDatabase`] wraps the pool and implements [`crate::traits::OrderStore`] on top of these functions.
mod db;

pub mod orders;

use std::{str::FromStr, time::Duration};

pub use db::SqliteDatabase;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::traits::OrderStoreError;

/// Connections are recycled after this long, regardless of use.
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(5 * 60);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens a bounded connection pool. Callers that find every connection in use wait for one to be released.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, OrderStoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .max_lifetime(MAX_CONNECTION_LIFETIME)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;
    Ok(pool)
}
