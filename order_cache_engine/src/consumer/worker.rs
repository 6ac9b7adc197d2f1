use std::collections::HashMap;

use log::*;
use tokio_util::sync::CancellationToken;

use super::{DeadLetterSink, DeliveryPolicy, IngestError, MessageSource, StreamMessage};
use crate::{
    cache::OrderCache,
    db_types::{Order, OrderId},
    traits::OrderStore,
    validation::validate_order,
};

/// Consecutive failures of the message a partition is stuck on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FailureStreak {
    offset: i64,
    attempts: u32,
}

pub struct OrderConsumer<S, B, D> {
    source: S,
    db: B,
    cache: OrderCache,
    dead_letters: D,
    policy: DeliveryPolicy,
    // Keyed by partition. Other partitions keep flowing while one is being retried.
    streaks: HashMap<i32, FailureStreak>,
}

impl<S, B, D> OrderConsumer<S, B, D>
where
    S: MessageSource,
    B: OrderStore,
    D: DeadLetterSink,
{
    pub fn new(source: S, db: B, cache: OrderCache, dead_letters: D, policy: DeliveryPolicy) -> Self {
        Self { source, db, cache, dead_letters, policy, streaks: HashMap::new() }
    }

    /// Consumes messages until `shutdown` is cancelled, then hands the source back so the caller can close it.
    ///
    /// Cancellation is only observed while waiting for the next message or during a backoff. A message that has
    /// already been fetched is always processed to the end.
    pub async fn run(mut self, shutdown: CancellationToken) -> S {
        info!("📥️ Order consumer started");
        loop {
            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                fetched = self.source.fetch() => fetched,
            };
            match fetched {
                Ok(message) => self.handle_message(message, &shutdown).await,
                Err(e) => error!("📥️ {e}"),
            }
        }
        info!("📥️ Order consumer stopped");
        self.source
    }

    /// Decodes, validates and stores a single message, then updates the cache. Does not commit.
    pub async fn process_message(&self, message: &StreamMessage) -> Result<OrderId, IngestError> {
        let order = serde_json::from_slice::<Order>(&message.payload)?;
        validate_order(&order)?;
        self.db.save_order(&order).await?;
        let order_id = order.order_uid.clone();
        self.cache.set(order_id.clone(), order);
        Ok(order_id)
    }

    async fn handle_message(&mut self, message: StreamMessage, shutdown: &CancellationToken) {
        trace!("📥️ Received message {message}");
        match self.process_message(&message).await {
            Ok(order_id) => {
                info!("📥️ Order [{order_id}] ingested from {message}");
                self.streaks.remove(&message.partition);
                self.commit(&message).await;
            },
            Err(e) if e.is_terminal() => {
                warn!("📥️ Skipping message {message}. {e}");
                self.streaks.remove(&message.partition);
                self.commit(&message).await;
            },
            Err(e) => self.handle_failure(message, e, shutdown).await,
        }
    }

    async fn handle_failure(&mut self, message: StreamMessage, err: IngestError, shutdown: &CancellationToken) {
        let attempts = self.record_failure(&message);
        error!("📥️ Attempt {attempts} to ingest {message} failed. {err}");
        if self.policy.should_dead_letter(attempts) {
            let reason = format!("Gave up after {attempts} attempts. {err}");
            match self.dead_letters.publish(&message, &reason).await {
                Ok(()) => {
                    warn!("📥️ Message {message} moved to dead letters after {attempts} attempts");
                    self.streaks.remove(&message.partition);
                    self.commit(&message).await;
                    return;
                },
                Err(e) => error!("📥️ Could not dead-letter {message}, it will be redelivered. {e}"),
            }
        }
        let delay = self.policy.backoff(attempts);
        if !delay.is_zero() {
            debug!("📥️ Waiting {}ms before redelivering {message}", delay.as_millis());
            tokio::select! {
                _ = shutdown.cancelled() => {},
                _ = tokio::time::sleep(delay) => {},
            }
        }
        if let Err(e) = self.source.redeliver(&message).await {
            error!("📥️ {e}");
        }
    }

    fn record_failure(&mut self, message: &StreamMessage) -> u32 {
        let fresh = FailureStreak { offset: message.offset, attempts: 0 };
        let streak = self.streaks.entry(message.partition).or_insert(fresh);
        if streak.offset != message.offset {
            *streak = fresh;
        }
        streak.attempts = streak.attempts.saturating_add(1);
        streak.attempts
    }

    async fn commit(&mut self, message: &StreamMessage) {
        if let Err(e) = self.source.commit(message).await {
            error!("📥️ {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            atomic::{AtomicU32, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::*;
    use crate::{
        consumer::DiscardDeadLetters,
        db_types::Order,
        test_utils::{
            fixtures::{sample_order, sample_payload},
            memory_stream::{MemoryDeadLetters, MemoryStream},
            prepare_env::{prepare_test_env, random_db_path},
            queries::row_count,
        },
        traits::OrderStoreError,
        SqliteDatabase,
    };

    const WAIT: Duration = Duration::from_secs(5);

    /// Wraps a real store and fails the first `failures` saves.
    #[derive(Clone)]
    struct FlakyStore {
        inner: SqliteDatabase,
        failures: Arc<AtomicU32>,
        saves: Arc<AtomicU32>,
    }

    impl FlakyStore {
        fn new(inner: SqliteDatabase, failures: u32) -> Self {
            Self { inner, failures: Arc::new(AtomicU32::new(failures)), saves: Arc::new(AtomicU32::new(0)) }
        }

        fn saves(&self) -> u32 {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl OrderStore for FlakyStore {
        async fn save_order(&self, order: &Order) -> Result<(), OrderStoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(OrderStoreError::DriverError(sqlx::Error::PoolTimedOut));
            }
            self.inner.save_order(order).await
        }

        async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderStoreError> {
            self.inner.fetch_order(order_id).await
        }

        async fn fetch_all_orders(&self) -> Result<Vec<Order>, OrderStoreError> {
            self.inner.fetch_all_orders().await
        }
    }

    async fn test_db() -> SqliteDatabase {
        let url = random_db_path();
        prepare_test_env(&url).await;
        SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
    }

    #[tokio::test]
    async fn valid_message_is_stored_cached_and_committed() {
        let db = test_db().await;
        let stream = MemoryStream::new();
        let cache = OrderCache::new();
        let consumer =
            OrderConsumer::new(stream.clone(), db.clone(), cache.clone(), DiscardDeadLetters, DeliveryPolicy::default());
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));

        stream.publish("X", sample_payload("X"));
        assert!(stream.wait_for_commit(1, WAIT).await);
        token.cancel();
        handle.await.unwrap();

        let id = OrderId::from("X");
        assert_eq!(*cache.get(&id).unwrap(), sample_order("X"));
        assert_eq!(db.fetch_order(&id).await.unwrap(), sample_order("X"));
    }

    #[tokio::test]
    async fn bad_messages_are_committed_without_being_stored() {
        let store = FlakyStore::new(test_db().await, 0);
        let stream = MemoryStream::new();
        let cache = OrderCache::new();
        let consumer =
            OrderConsumer::new(stream.clone(), store.clone(), cache.clone(), DiscardDeadLetters, DeliveryPolicy::default());
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));

        stream.publish("junk", b"this is not json".to_vec());
        let mut no_items = sample_order("no-items");
        no_items.items.clear();
        stream.publish("no-items", serde_json::to_vec(&no_items).unwrap());
        let mut no_track = sample_order("no-track");
        no_track.track_number.clear();
        stream.publish("no-track", serde_json::to_vec(&no_track).unwrap());

        assert!(stream.wait_for_commit(3, WAIT).await);
        token.cancel();
        handle.await.unwrap();

        assert_eq!(store.saves(), 0);
        assert_eq!(cache.size(), 0);
        assert_eq!(stream.fetched(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn store_failures_are_redelivered_until_they_succeed() {
        let store = FlakyStore::new(test_db().await, 2);
        let stream = MemoryStream::new();
        let cache = OrderCache::new();
        let consumer = OrderConsumer::new(
            stream.clone(),
            store.clone(),
            cache.clone(),
            DiscardDeadLetters,
            DeliveryPolicy::default().without_backoff(),
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));

        stream.publish("R", sample_payload("R"));
        stream.publish("S", sample_payload("S"));
        assert!(stream.wait_for_commit(2, WAIT).await);
        token.cancel();
        handle.await.unwrap();

        assert_eq!(stream.fetched(), vec![0, 0, 0, 1]);
        assert_eq!(store.saves(), 4);
        assert_eq!(cache.size(), 2);
        // Failed attempts are rolled back, so the items were written exactly once.
        assert_eq!(row_count(&store.inner, "items", &OrderId::from("R")).await, 1);
    }

    #[tokio::test]
    async fn message_is_not_committed_while_the_store_is_failing() {
        let store = FlakyStore::new(test_db().await, u32::MAX);
        let stream = MemoryStream::new();
        let consumer = OrderConsumer::new(
            stream.clone(),
            store.clone(),
            OrderCache::new(),
            DiscardDeadLetters,
            DeliveryPolicy::default().with_backoff(Duration::from_millis(5), Duration::from_millis(5)),
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));

        stream.publish("stuck", sample_payload("stuck"));
        stream.publish("behind", sample_payload("behind"));
        assert!(!stream.wait_for_commit(1, Duration::from_millis(300)).await);
        token.cancel();
        handle.await.unwrap();

        assert_eq!(stream.committed(), None);
        assert!(store.saves() > 1);
        assert!(stream.fetched().iter().all(|o| *o == 0));
    }

    #[tokio::test]
    async fn exhausted_messages_are_dead_lettered_and_committed() {
        let store = FlakyStore::new(test_db().await, 3);
        let stream = MemoryStream::new();
        let dead_letters = MemoryDeadLetters::new();
        let cache = OrderCache::new();
        let consumer = OrderConsumer::new(
            stream.clone(),
            store.clone(),
            cache.clone(),
            dead_letters.clone(),
            DeliveryPolicy::default().without_backoff().with_max_attempts(3),
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));

        stream.publish("poison", sample_payload("poison"));
        stream.publish("fine", sample_payload("fine"));
        assert!(stream.wait_for_commit(2, WAIT).await);
        token.cancel();
        handle.await.unwrap();

        let letters = dead_letters.letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].0.offset, 0);
        assert!(letters[0].1.contains("3 attempts"));
        assert!(!cache.contains(&OrderId::from("poison")));
        assert!(cache.contains(&OrderId::from("fine")));
        assert_eq!(stream.fetched(), vec![0, 0, 0, 1]);
    }

    /// Fails every save of one order and passes the others through.
    #[derive(Clone)]
    struct RejectingStore {
        inner: SqliteDatabase,
        rejected: OrderId,
        rejections: Arc<AtomicU32>,
    }

    impl OrderStore for RejectingStore {
        async fn save_order(&self, order: &Order) -> Result<(), OrderStoreError> {
            if order.order_uid == self.rejected {
                self.rejections.fetch_add(1, Ordering::SeqCst);
                return Err(OrderStoreError::DriverError(sqlx::Error::PoolTimedOut));
            }
            self.inner.save_order(order).await
        }

        async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderStoreError> {
            self.inner.fetch_order(order_id).await
        }

        async fn fetch_all_orders(&self) -> Result<Vec<Order>, OrderStoreError> {
            self.inner.fetch_all_orders().await
        }
    }

    #[tokio::test]
    async fn attempts_are_counted_per_partition() {
        let store = RejectingStore {
            inner: test_db().await,
            rejected: OrderId::from("poison"),
            rejections: Arc::new(AtomicU32::new(0)),
        };
        let stream = MemoryStream::new();
        let dead_letters = MemoryDeadLetters::new();
        let cache = OrderCache::new();
        let consumer = OrderConsumer::new(
            stream.clone(),
            store.clone(),
            cache.clone(),
            dead_letters.clone(),
            DeliveryPolicy::default().without_backoff().with_max_attempts(3),
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));

        stream.publish_to(0, "poison", sample_payload("poison"));
        for i in 0..5 {
            let id = format!("good-{i}");
            stream.publish_to(1, &id, sample_payload(&id));
        }
        assert!(stream.wait_for_commit_on(0, 1, WAIT).await);
        assert!(stream.wait_for_commit_on(1, 5, WAIT).await);
        token.cancel();
        handle.await.unwrap();

        // Successes on partition 1 between the retries must not reset the count for partition 0.
        assert_eq!(stream.fetched_from(0), vec![0, 0, 0]);
        assert_eq!(store.rejections.load(Ordering::SeqCst), 3);
        let letters = dead_letters.letters();
        assert_eq!(letters.len(), 1);
        assert_eq!((letters[0].0.partition, letters[0].0.offset), (0, 0));
        assert_eq!(stream.fetched_from(1), vec![0, 1, 2, 3, 4]);
        assert!(!cache.contains(&OrderId::from("poison")));
        assert_eq!(cache.size(), 5);
    }

    #[tokio::test]
    async fn failed_dead_letter_falls_back_to_redelivery() {
        let store = FlakyStore::new(test_db().await, 2);
        let stream = MemoryStream::new();
        let consumer = OrderConsumer::new(
            stream.clone(),
            store.clone(),
            OrderCache::new(),
            MemoryDeadLetters::failing(),
            DeliveryPolicy::default().without_backoff().with_max_attempts(1),
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));

        stream.publish("T", sample_payload("T"));
        assert!(stream.wait_for_commit(1, WAIT).await);
        token.cancel();
        handle.await.unwrap();

        assert_eq!(stream.fetched(), vec![0, 0, 0]);
        assert_eq!(row_count(&store.inner, "orders", &OrderId::from("T")).await, 1);
    }

    #[tokio::test]
    async fn redelivered_order_overwrites_the_cache_entry() {
        let db = test_db().await;
        let stream = MemoryStream::new();
        let cache = OrderCache::new();
        let consumer =
            OrderConsumer::new(stream.clone(), db.clone(), cache.clone(), DiscardDeadLetters, DeliveryPolicy::default());
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));

        stream.publish("Z", sample_payload("Z"));
        let mut changed = sample_order("Z");
        changed.track_number = "NEWTRACK".into();
        stream.publish("Z", serde_json::to_vec(&changed).unwrap());
        assert!(stream.wait_for_commit(2, WAIT).await);
        token.cancel();
        handle.await.unwrap();

        let id = OrderId::from("Z");
        assert_eq!(cache.get(&id).unwrap().track_number, "NEWTRACK");
        let stored = db.fetch_order(&id).await.unwrap();
        assert_eq!(stored.track_number, "WBILMTESTTRACK");
        assert_eq!(stored.items.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_an_idle_consumer() {
        let db = test_db().await;
        let stream = MemoryStream::new();
        let consumer =
            OrderConsumer::new(stream.clone(), db, OrderCache::new(), DiscardDeadLetters, DeliveryPolicy::default());
        let token = CancellationToken::new();
        let handle = tokio::spawn(consumer.run(token.clone()));
        token.cancel();
        let result = tokio::time::timeout(WAIT, handle).await;
        assert!(result.is_ok(), "consumer did not stop after cancellation");
    }

    #[tokio::test]
    async fn process_message_reports_each_failure_kind() {
        let db = test_db().await;
        let consumer =
            OrderConsumer::new(MemoryStream::new(), db, OrderCache::new(), DiscardDeadLetters, DeliveryPolicy::default());
        let message = |payload: Vec<u8>| StreamMessage {
            topic: "orders".into(),
            partition: 0,
            offset: 0,
            key: None,
            payload,
        };
        let err = consumer.process_message(&message(b"{".to_vec())).await.unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)) && err.is_terminal());
        let err = consumer.process_message(&message(b"{}".to_vec())).await.unwrap_err();
        assert!(matches!(err, IngestError::Invalid(_)) && err.is_terminal());
        let id = consumer.process_message(&message(sample_payload("ok"))).await.unwrap();
        assert_eq!(id, OrderId::from("ok"));
    }
}
