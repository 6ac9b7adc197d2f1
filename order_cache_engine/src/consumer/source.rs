use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("Could not fetch a message from the stream: {0}")]
    FetchError(String),
    #[error("Could not commit offset {offset} on partition {partition}: {reason}")]
    CommitError { partition: i32, offset: i64, reason: String },
    #[error("Could not rewind partition {partition} to offset {offset}: {reason}")]
    RedeliveryError { partition: i32, offset: i64, reason: String },
    #[error("Could not publish to the dead-letter destination: {0}")]
    DeadLetterError(String),
    #[error("The stream has been closed")]
    Closed,
}

/// A single message read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl StreamMessage {
    pub fn key_str(&self) -> String {
        self.key.as_deref().map(|k| String::from_utf8_lossy(k).into_owned()).unwrap_or_default()
    }
}

impl Display for StreamMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// A position-tracking source of stream messages.
#[allow(async_fn_in_trait)]
pub trait MessageSource {
    /// Waits until the next message is available.
    async fn fetch(&mut self) -> Result<StreamMessage, StreamError>;

    /// Marks everything up to and including `message` as processed.
    async fn commit(&mut self, message: &StreamMessage) -> Result<(), StreamError>;

    /// Arranges for `message` to be returned again by the next call to [`Self::fetch`].
    async fn redeliver(&mut self, message: &StreamMessage) -> Result<(), StreamError>;
}
