use crate::{db_types::OrderId, SqliteDatabase};

const ORDER_TABLES: [&str; 4] = ["orders", "deliveries", "payments", "items"];

/// Counts the rows in `table` that belong to `order_id`. Only the four order tables are accepted.
pub async fn row_count(db: &SqliteDatabase, table: &str, order_id: &OrderId) -> i64 {
    assert!(ORDER_TABLES.contains(&table), "{table} is not an order table");
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE order_uid = $1"))
        .bind(order_id)
        .fetch_one(db.pool())
        .await
        .expect("Error counting rows");
    count
}
