use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use order_cache_engine::{OrderQueryApi, OrderStore};

use crate::routes::{health, CacheStatsRoute, OrderByIdRoute};

/// Issues a GET request for `path` against an app that serves every route from `api`.
pub async fn get_request<B: OrderStore + 'static>(path: &str, api: OrderQueryApi<B>) -> (StatusCode, String) {
    let app = App::new()
        .app_data(web::Data::new(api))
        .service(health)
        .service(OrderByIdRoute::<B>::new())
        .service(CacheStatsRoute::<B>::new());
    let service = test::init_service(app).await;
    debug!("Making request to {path}");
    let req = TestRequest::get().uri(path).to_request();
    let res = test::call_service(&service, req).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}
