use mockall::mock;
use order_cache_engine::{
    db_types::{Order, OrderId},
    OrderStore,
    OrderStoreError,
};

mock! {
    pub Store {}
    impl OrderStore for Store {
        async fn save_order(&self, order: &Order) -> Result<(), OrderStoreError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderStoreError>;
        async fn fetch_all_orders(&self) -> Result<Vec<Order>, OrderStoreError>;
    }
}
