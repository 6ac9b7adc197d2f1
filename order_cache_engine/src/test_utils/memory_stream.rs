use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::Notify;

use crate::consumer::{DeadLetterSink, MessageSource, StreamError, StreamMessage};

pub const MEMORY_TOPIC: &str = "orders";

#[derive(Debug, Default)]
struct PartitionState {
    messages: Vec<StreamMessage>,
    position: usize,
    committed: Option<i64>,
}

#[derive(Debug, Default)]
struct StreamState {
    partitions: BTreeMap<i32, PartitionState>,
    /// Index of the partition to try first on the next fetch.
    cursor: usize,
    fetched: Vec<(i32, i64)>,
}

/// An in-memory stream. Offsets are indexes into each partition's published messages.
///
/// Partitions are read round-robin, one message at a time, so messages from different partitions interleave the way
/// they do for a consumer with several assigned partitions. The helpers without a partition argument act on
/// partition 0.
///
/// Clones share state, so a test can keep a handle while the consumer owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    state: Arc<Mutex<StreamState>>,
    notify: Arc<Notify>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to partition 0 and returns its offset.
    pub fn publish(&self, key: &str, payload: Vec<u8>) -> i64 {
        self.publish_to(0, key, payload)
    }

    /// Appends a message to `partition` and returns its offset.
    pub fn publish_to(&self, partition: i32, key: &str, payload: Vec<u8>) -> i64 {
        let offset = {
            let mut state = self.lock();
            let part = state.partitions.entry(partition).or_default();
            let offset = part.messages.len() as i64;
            part.messages.push(StreamMessage {
                topic: MEMORY_TOPIC.into(),
                partition,
                offset,
                key: Some(key.as_bytes().to_vec()),
                payload,
            });
            offset
        };
        self.notify.notify_waiters();
        offset
    }

    pub fn committed(&self) -> Option<i64> {
        self.committed_on(0)
    }

    /// The next offset to be consumed on `partition` according to the last commit.
    pub fn committed_on(&self, partition: i32) -> Option<i64> {
        self.lock().partitions.get(&partition).and_then(|p| p.committed)
    }

    pub fn fetched(&self) -> Vec<i64> {
        self.fetched_from(0)
    }

    /// Every offset of `partition` handed out by `fetch`, in order, including redeliveries.
    pub fn fetched_from(&self, partition: i32) -> Vec<i64> {
        self.lock().fetched.iter().filter(|(p, _)| *p == partition).map(|(_, o)| *o).collect()
    }

    pub async fn wait_for_commit(&self, offset: i64, timeout: Duration) -> bool {
        self.wait_for_commit_on(0, offset, timeout).await
    }

    /// Polls until the committed offset of `partition` reaches `offset`. Returns `false` on timeout.
    pub async fn wait_for_commit_on(&self, partition: i32, offset: i64, timeout: Duration) -> bool {
        let wait = async {
            while self.committed_on(partition).map_or(true, |c| c < offset) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_message(&self) -> Option<StreamMessage> {
        let mut state = self.lock();
        let ids = state.partitions.keys().copied().collect::<Vec<_>>();
        for i in 0..ids.len() {
            let index = (state.cursor + i) % ids.len();
            let part = state.partitions.get_mut(&ids[index])?;
            let Some(msg) = part.messages.get(part.position).cloned() else {
                continue;
            };
            part.position += 1;
            state.cursor = index + 1;
            state.fetched.push((msg.partition, msg.offset));
            return Some(msg);
        }
        None
    }
}

impl MessageSource for MemoryStream {
    async fn fetch(&mut self) -> Result<StreamMessage, StreamError> {
        loop {
            let notified = self.notify.notified();
            if let Some(msg) = self.next_message() {
                return Ok(msg);
            }
            notified.await;
        }
    }

    async fn commit(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        if let Some(part) = self.lock().partitions.get_mut(&message.partition) {
            part.committed = Some(message.offset + 1);
        }
        Ok(())
    }

    async fn redeliver(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        if let Some(part) = self.lock().partitions.get_mut(&message.partition) {
            part.position = message.offset as usize;
        }
        Ok(())
    }
}

/// Collects dead letters so that tests can inspect them. Can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeadLetters {
    letters: Arc<Mutex<Vec<(StreamMessage, String)>>>,
    fail: bool,
}

impl MemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn letters(&self) -> Vec<(StreamMessage, String)> {
        self.letters.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DeadLetterSink for MemoryDeadLetters {
    async fn publish(&self, message: &StreamMessage, reason: &str) -> Result<(), StreamError> {
        if self.fail {
            return Err(StreamError::DeadLetterError("dead-letter destination is unavailable".into()));
        }
        self.letters.lock().unwrap_or_else(PoisonError::into_inner).push((message.clone(), reason.to_string()));
        Ok(())
    }
}
