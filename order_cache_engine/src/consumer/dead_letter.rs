use log::*;

use super::{StreamError, StreamMessage};

/// Destination for messages that have exhausted their delivery attempts.
#[allow(async_fn_in_trait)]
pub trait DeadLetterSink {
    async fn publish(&self, message: &StreamMessage, reason: &str) -> Result<(), StreamError>;
}

/// Logs dead letters and drops them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardDeadLetters;

impl DeadLetterSink for DiscardDeadLetters {
    async fn publish(&self, message: &StreamMessage, reason: &str) -> Result<(), StreamError> {
        error!(
            "💀️ Discarding message {message} (key: {}) after repeated failures. {reason}. Payload: {}",
            message.key_str(),
            String::from_utf8_lossy(&message.payload)
        );
        Ok(())
    }
}
