use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use order_cache_engine::DeliveryPolicy;

const DEFAULT_OCS_HOST: &str = "127.0.0.1";
const DEFAULT_OCS_PORT: u16 = 8081;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/orders.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";
const DEFAULT_KAFKA_TOPIC: &str = "orders";
const DEFAULT_KAFKA_GROUP_ID: &str = "order-service-group";
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Upper bound on open database connections. Callers queue for a connection when all are in use.
    pub db_max_connections: u32,
    pub stream: StreamConfig,
    pub delivery: DeliveryPolicy,
}

#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Comma-separated broker list, passed to Kafka as-is.
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    /// Where messages go after exhausting their delivery attempts. `None` logs and drops them.
    pub dead_letter_topic: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OCS_HOST.to_string(),
            port: DEFAULT_OCS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            stream: StreamConfig::default(),
            delivery: default_delivery_policy(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            brokers: DEFAULT_KAFKA_BROKERS.to_string(),
            topic: DEFAULT_KAFKA_TOPIC.to_string(),
            group_id: DEFAULT_KAFKA_GROUP_ID.to_string(),
            dead_letter_topic: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("OCS_HOST").ok().unwrap_or_else(|| DEFAULT_OCS_HOST.into());
        let port = parse_value("OCS_PORT", env::var("OCS_PORT").ok(), DEFAULT_OCS_PORT);
        let database_url = env::var("OCS_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ OCS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.into()
        });
        let db_max_connections =
            parse_value("OCS_DB_MAX_CONNECTIONS", env::var("OCS_DB_MAX_CONNECTIONS").ok(), DEFAULT_DB_MAX_CONNECTIONS);
        let stream = StreamConfig::from_env_or_default();
        let delivery = delivery_policy_from_env();
        Self { host, port, database_url, db_max_connections, stream, delivery }
    }
}

impl StreamConfig {
    pub fn from_env_or_default() -> Self {
        let brokers = env::var("OCS_KAFKA_BROKERS").ok().unwrap_or_else(|| {
            info!("🪛️ OCS_KAFKA_BROKERS is not set. Using {DEFAULT_KAFKA_BROKERS}");
            DEFAULT_KAFKA_BROKERS.into()
        });
        let topic = env::var("OCS_KAFKA_TOPIC").ok().unwrap_or_else(|| DEFAULT_KAFKA_TOPIC.into());
        let group_id = env::var("OCS_KAFKA_GROUP_ID").ok().unwrap_or_else(|| DEFAULT_KAFKA_GROUP_ID.into());
        let dead_letter_topic = env::var("OCS_DEAD_LETTER_TOPIC").ok().filter(|s| !s.trim().is_empty());
        match &dead_letter_topic {
            Some(t) => info!("🪛️ Dead letters will be published to {t}"),
            None => info!("🪛️ OCS_DEAD_LETTER_TOPIC is not set. Dead letters will be logged and dropped."),
        }
        Self { brokers, topic, group_id, dead_letter_topic }
    }
}

fn default_delivery_policy() -> DeliveryPolicy {
    DeliveryPolicy::default().with_backoff(
        Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        Duration::from_millis(DEFAULT_RETRY_MAX_BACKOFF_MS),
    )
}

fn delivery_policy_from_env() -> DeliveryPolicy {
    let initial = parse_value("OCS_RETRY_BACKOFF_MS", env::var("OCS_RETRY_BACKOFF_MS").ok(), DEFAULT_RETRY_BACKOFF_MS);
    let max =
        parse_value("OCS_RETRY_MAX_BACKOFF_MS", env::var("OCS_RETRY_MAX_BACKOFF_MS").ok(), DEFAULT_RETRY_MAX_BACKOFF_MS);
    let max_attempts = parse_max_attempts(env::var("OCS_MAX_DELIVERY_ATTEMPTS").ok());
    let policy = DeliveryPolicy { max_attempts, ..DeliveryPolicy::default() }
        .with_backoff(Duration::from_millis(initial), Duration::from_millis(max));
    match policy.max_attempts {
        Some(n) => info!("🪛️ Messages that fail to store {n} times in a row will be dead-lettered"),
        None => info!("🪛️ OCS_MAX_DELIVERY_ATTEMPTS is not set. Failed messages are retried until they succeed."),
    }
    policy
}

/// Unset, empty or zero means "retry forever".
fn parse_max_attempts(value: Option<String>) -> Option<u32> {
    let value = value.filter(|s| !s.trim().is_empty())?;
    match value.trim().parse::<u32>() {
        Ok(0) => None,
        Ok(n) => Some(n),
        Err(e) => {
            error!("🪛️ {value} is not a valid value for OCS_MAX_DELIVERY_ATTEMPTS. {e} Retrying forever instead.");
            None
        },
    }
}

fn parse_value<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match value {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}
