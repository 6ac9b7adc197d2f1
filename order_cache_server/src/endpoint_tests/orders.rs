use actix_web::http::StatusCode;
use order_cache_engine::{
    db_types::{Order, OrderId},
    test_utils::fixtures::sample_order,
    OrderCache,
    OrderQueryApi,
    OrderStoreError,
};

use super::{helpers::get_request, mocks::MockStore};

#[actix_web::test]
async fn cached_order_is_served_without_the_store() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().never();
    let cache = OrderCache::new();
    cache.set(OrderId::from("X"), sample_order("X"));
    let (status, body) = get_request("/order/X", OrderQueryApi::new(store, cache)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("body should be an order");
    assert_eq!(order, sample_order("X"));
}

#[actix_web::test]
async fn uncached_order_is_loaded_and_cached() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().times(1).returning(|id| Ok(sample_order(id.as_str())));
    let cache = OrderCache::new();
    let (status, body) = get_request("/order/Y", OrderQueryApi::new(store, cache.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::to_string(&sample_order("Y")).unwrap());
    assert!(cache.contains(&OrderId::from("Y")));
}

#[actix_web::test]
async fn unknown_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().times(1).returning(|id| Err(OrderStoreError::OrderNotFound(id.clone())));
    let cache = OrderCache::new();
    let (status, body) = get_request("/order/missing", OrderQueryApi::new(store, cache.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Order missing does not exist"}"#);
    assert_eq!(cache.size(), 0);
}

#[actix_web::test]
async fn store_failure_is_an_internal_error() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().returning(|_| Err(OrderStoreError::MigrationError("database is locked".into())));
    let (status, body) = get_request("/order/Z", OrderQueryApi::new(store, OrderCache::new())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"error":"Internal server error"}"#);
}

#[actix_web::test]
async fn driver_errors_are_not_sent_to_the_client() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_fetch_order()
        .returning(|_| Err(OrderStoreError::MigrationError("no such column: orders.secret_notes".into())));
    let (status, body) = get_request("/order/Z", OrderQueryApi::new(store, OrderCache::new())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"error":"Internal server error"}"#);
    assert!(!body.contains("no such column"));
}

#[actix_web::test]
async fn empty_order_id_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().never();
    let (status, body) = get_request("/order/", OrderQueryApi::new(store, OrderCache::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Could not read request path: order_uid must not be empty"}"#);
}
