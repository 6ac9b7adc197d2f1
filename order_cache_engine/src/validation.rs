//! Required-field checks for incoming orders.
//!
//! Validation is pure: it never touches the store or the cache. A failing order is not retried by the consumer, it
//! is logged and skipped.
use thiserror::Error;

use crate::db_types::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid order: the order_uid is empty")]
    EmptyOrderId,
    #[error("Invalid order: the track_number is empty")]
    EmptyTrackNumber,
    #[error("Invalid order: an order must contain at least one item")]
    NoItems,
}

/// Checks the order invariants in a fixed order and reports the first one that is violated.
pub fn validate_order(order: &Order) -> Result<(), ValidationError> {
    if order.order_uid.is_empty() {
        return Err(ValidationError::EmptyOrderId);
    }
    if order.track_number.is_empty() {
        return Err(ValidationError::EmptyTrackNumber);
    }
    if order.items.is_empty() {
        return Err(ValidationError::NoItems);
    }
    Ok(())
}
