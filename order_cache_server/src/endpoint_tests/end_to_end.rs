//! Ingests through the in-memory stream into a real SQLite store, then reads back over HTTP.
use std::time::Duration;

use actix_web::http::StatusCode;
use order_cache_engine::{
    db_types::Order,
    rehydrate_cache,
    test_utils::{
        fixtures::{sample_order, sample_payload},
        memory_stream::MemoryStream,
        prepare_env::{prepare_test_env, random_db_path},
    },
    DeliveryPolicy,
    DiscardDeadLetters,
    OrderCache,
    OrderConsumer,
    OrderQueryApi,
    SqliteDatabase,
};
use tokio_util::sync::CancellationToken;

use super::helpers::get_request;

#[actix_web::test]
async fn ingested_order_is_served_over_http() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let cache = OrderCache::new();
    let stream = MemoryStream::new();
    let consumer =
        OrderConsumer::new(stream.clone(), db.clone(), cache.clone(), DiscardDeadLetters, DeliveryPolicy::default());
    let token = CancellationToken::new();
    let handle = tokio::spawn(consumer.run(token.clone()));

    stream.publish("X", sample_payload("X"));
    stream.publish("junk", b"{not json".to_vec());
    assert!(stream.wait_for_commit(2, Duration::from_secs(5)).await, "messages were not committed");
    token.cancel();
    handle.await.expect("consumer task failed");

    let api = OrderQueryApi::new(db.clone(), cache.clone());
    let (status, body) = get_request("/order/X", api.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("body should be an order");
    assert_eq!(order, sample_order("X"));

    let (status, _) = get_request("/order/missing", api.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get_request("/cache/stats", api).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"cache_size":1,"orders":["X"]}"#);

    // A restart with an empty cache is served from the store after rehydration.
    let fresh = OrderCache::new();
    assert_eq!(rehydrate_cache(&db, &fresh).await.unwrap(), 1);
    let (status, body) = get_request("/cache/stats", OrderQueryApi::new(db.clone(), fresh)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"cache_size":1,"orders":["X"]}"#);
    db.close().await;
}
