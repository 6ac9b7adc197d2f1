use std::{path::Path, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use order_cache_engine::{rehydrate_cache, OrderCache, OrderConsumer, OrderQueryApi, SqliteDatabase};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    kafka::{KafkaSource, ServerDeadLetters},
    routes::{health, CacheStatsRoute, OrderByIdRoute},
};

const CLIENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Starts every component and runs until the HTTP server stops (on SIGINT or SIGTERM).
///
/// Startup order: database, schema, cache rehydration, Kafka consumer, HTTP server. Failing to open the database or
/// to connect to Kafka is fatal. Failing to rehydrate the cache is not; the cache fills up as orders are read.
///
/// On the way out, the consumer is cancelled and awaited before the connection pool is closed.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    ensure_db_directory(&config.database_url)?;
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not connect to the database. {e}")))?;
    db.create_schema().await?;

    let cache = OrderCache::new();
    match rehydrate_cache(&db, &cache).await {
        Ok(count) => info!("🚀️ {count} orders loaded into the cache"),
        Err(e) => warn!("🚀️ Could not load stored orders into the cache. Starting with an empty cache. {e}"),
    }

    let source = KafkaSource::new(&config.stream)?;
    let dead_letters = ServerDeadLetters::from_config(&config.stream)?;
    let consumer = OrderConsumer::new(source, db.clone(), cache.clone(), dead_letters, config.delivery);
    let shutdown = CancellationToken::new();
    let consumer_task = tokio::spawn(consumer.run(shutdown.clone()));

    let result = match create_server_instance(&config, db.clone(), cache) {
        Ok(srv) => srv.await.map_err(ServerError::from),
        Err(e) => Err(e),
    };

    info!("🚀️ HTTP server has stopped. Stopping the order consumer");
    shutdown.cancel();
    match consumer_task.await {
        Ok(source) => drop(source),
        Err(e) => error!("🚀️ The order consumer did not shut down cleanly. {e}"),
    }
    db.close().await;
    info!("🚀️ Shutdown complete");
    result
}

pub fn create_server_instance(config: &ServerConfig, db: SqliteDatabase, cache: OrderCache) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let orders_api = OrderQueryApi::new(db.clone(), cache.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ocs::access_log"))
            .app_data(web::Data::new(orders_api))
            .service(health)
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(CacheStatsRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(KEEP_ALIVE))
    .client_request_timeout(CLIENT_REQUEST_TIMEOUT)
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// SQLite creates the database file on demand, but not its parent directory.
fn ensure_db_directory(url: &str) -> Result<(), ServerError> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("🚀️ Creating database directory {}", dir.display());
            std::fs::create_dir_all(dir)?;
            Ok(())
        },
        _ => Ok(()),
    }
}
