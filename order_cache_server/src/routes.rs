//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: the lookup logic lives in
//! [`OrderQueryApi`](order_cache_engine::OrderQueryApi).
//!
//! Since each worker thread processes its requests sequentially, handlers must not block the current thread. Anything
//! that waits on I/O is expressed as a future.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use order_cache_engine::{db_types::OrderId, OrderQueryApi, OrderStore};

use crate::errors::ServerError;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
// The pattern also matches an empty id, so that `/order/` reaches the handler and is rejected with a 400.
route!(order_by_id => Get "/order/{order_uid:.*}" impl OrderStore);
/// Route handler for `/order/{order_uid}`.
///
/// Returns the full order aggregate as JSON. Cached orders are returned without touching the database. Unknown ids
/// return a 404, and are looked up in the database again on every request.
pub async fn order_by_id<B: OrderStore>(
    path: web::Path<String>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_uid = path.into_inner();
    debug!("💻️ GET order_by_id({order_uid})");
    if order_uid.is_empty() {
        return Err(ServerError::InvalidRequestPath("order_uid must not be empty".into()));
    }
    let order = api.fetch_order(&OrderId::from(order_uid)).await?;
    Ok(HttpResponse::Ok().json(order.as_ref()))
}

route!(cache_stats => Get "/cache/stats" impl OrderStore);
/// Route handler for `/cache/stats`. Reports the number of cached orders and their ids, sorted.
pub async fn cache_stats<B: OrderStore>(api: web::Data<OrderQueryApi<B>>) -> impl Responder {
    trace!("💻️ GET cache_stats");
    HttpResponse::Ok().json(api.cache_stats())
}
