use thiserror::Error;

use crate::db_types::{Order, OrderId};

#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// Any failure reported by the database driver. These are transient from the consumer's point of view: the write
    /// is rolled back and the message is redelivered.
    #[error("Database error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Could not prepare the database schema: {0}")]
    MigrationError(String),
}

impl OrderStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::OrderNotFound(_))
    }
}

/// Durable storage of the order aggregate (header, delivery, payment and items).
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    /// Stores the order in a single atomic transaction.
    ///
    /// * The header, delivery and payment records are insert-if-absent: if a record for this `order_uid` already
    ///   exists, it is left untouched.
    /// * Every item is appended. Saving the same order twice therefore stores its items twice.
    ///
    /// Either all of these writes are committed, or none are.
    async fn save_order(&self, order: &Order) -> Result<(), OrderStoreError>;

    /// Reconstructs the order aggregate for `order_id`.
    ///
    /// Returns [`OrderStoreError::OrderNotFound`] if there is no header record. Missing delivery or payment records
    /// are tolerated and come back as empty sub-records.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderStoreError>;

    /// Fetches every stored order, most recently ingested first.
    ///
    /// Orders that cannot be reconstructed are logged and skipped, so the result may be a subset of the stored
    /// orders. Only a failure to enumerate the order ids is reported as an error.
    async fn fetch_all_orders(&self) -> Result<Vec<Order>, OrderStoreError>;
}
