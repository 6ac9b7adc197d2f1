//! # Stream ingestion
//!
//! [`OrderConsumer`] reads order messages from a [`MessageSource`] one at a time and, for each one:
//!
//! 1. decodes the JSON payload into an [`Order`](crate::db_types::Order),
//! 2. validates it,
//! 3. saves it to the [`OrderStore`](crate::traits::OrderStore),
//! 4. puts it in the [`OrderCache`](crate::cache::OrderCache),
//! 5. commits the message offset.
//!
//! Messages that cannot be decoded or fail validation are logged and committed without being stored, since
//! redelivering them would not change the outcome. If the store write fails, the offset is *not* committed and the
//! source is asked to redeliver the same message, so every stored order is ingested at least once.
//!
//! Redelivery is unbounded by default. A [`DeliveryPolicy`] adds a backoff between attempts and, optionally, a cap
//! after which the message is handed to a [`DeadLetterSink`] and committed.
//!
//! The transport is abstracted behind [`MessageSource`] and [`DeadLetterSink`], so the consumer does not know about
//! Kafka or any other broker.
mod dead_letter;
mod errors;
mod policy;
mod source;
mod worker;

pub use dead_letter::{DeadLetterSink, DiscardDeadLetters};
pub use errors::IngestError;
pub use policy::DeliveryPolicy;
pub use source::{MessageSource, StreamError, StreamMessage};
pub use worker::OrderConsumer;
