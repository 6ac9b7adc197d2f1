use actix_web::http::StatusCode;
use order_cache_engine::{db_types::OrderId, test_utils::fixtures::sample_order, OrderCache, OrderQueryApi};

use super::{helpers::get_request, mocks::MockStore};

#[actix_web::test]
async fn empty_cache() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/cache/stats", OrderQueryApi::new(MockStore::new(), OrderCache::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"cache_size":0,"orders":[]}"#);
}

#[actix_web::test]
async fn ids_are_sorted() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().never();
    let cache = OrderCache::new();
    for id in ["c", "a", "b"] {
        cache.set(OrderId::from(id), sample_order(id));
    }
    let (status, body) = get_request("/cache/stats", OrderQueryApi::new(store, cache)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"cache_size":3,"orders":["a","b","c"]}"#);
}
