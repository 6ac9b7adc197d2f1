use thiserror::Error;

use crate::{db_types::OrderId, traits::OrderStoreError};

/// Errors surfaced on the read path. Store failures carry no detail: driver messages can name tables and columns, and
/// the read path logs them before converting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderQueryError {
    #[error("Order {0} was not found")]
    NotFound(OrderId),
    #[error("The order store is unavailable")]
    Backend,
}

impl From<OrderStoreError> for OrderQueryError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => Self::NotFound(id),
            _ => Self::Backend,
        }
    }
}
