use thiserror::Error;

use super::StreamError;
use crate::{traits::OrderStoreError, validation::ValidationError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Could not decode the order payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    #[error("Could not save the order: {0}")]
    Store(#[from] OrderStoreError),
    #[error("{0}")]
    Stream(#[from] StreamError),
}

impl IngestError {
    /// Terminal errors are a property of the message itself. Redelivering the message cannot fix them, so it is
    /// dropped and committed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Invalid(_))
    }
}
