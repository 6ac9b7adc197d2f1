use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{Delivery, Item, Order, OrderId, Payment};

/// Inserts the order header unless a header with the same `order_uid` already exists. Returns `true` if a row was
/// written.
///
/// This is not atomic on its own. Embed it in a transaction, and pass `&mut *tx` as the connection argument, to
/// group it with the other writes for the order.
pub async fn insert_header_if_absent(
    order: &Order,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO orders (
                order_uid,
                track_number,
                entry,
                locale,
                internal_signature,
                customer_id,
                delivery_service,
                shardkey,
                sm_id,
                date_created,
                oof_shard,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (order_uid) DO NOTHING;
        "#,
    )
    .bind(&order.order_uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .bind(created_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Inserts the delivery record for `order_id`, unless one already exists. Returns `true` if a row was written.
pub async fn insert_delivery_if_absent(
    order_id: &OrderId,
    delivery: &Delivery,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_uid) DO NOTHING;
        "#,
    )
    .bind(order_id)
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Inserts the payment record for `order_id`, unless one already exists. Returns `true` if a row was written.
pub async fn insert_payment_if_absent(
    order_id: &OrderId,
    payment: &Payment,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO payments (
                order_uid,
                transaction_id,
                request_id,
                currency,
                provider,
                amount,
                payment_dt,
                bank,
                delivery_cost,
                goods_total,
                custom_fee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO NOTHING;
        "#,
    )
    .bind(order_id)
    .bind(&payment.transaction)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Appends an item row for `order_id`. There is no duplicate check.
pub async fn append_item(order_id: &OrderId, item: &Item, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO items (
                order_uid,
                chrt_id,
                track_number,
                price,
                rid,
                name,
                sale,
                size,
                total_price,
                nm_id,
                brand,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12);
        "#,
    )
    .bind(order_id)
    .bind(item.chrt_id)
    .bind(&item.track_number)
    .bind(item.price)
    .bind(&item.rid)
    .bind(&item.name)
    .bind(item.sale)
    .bind(&item.size)
    .bind(item.total_price)
    .bind(item.nm_id)
    .bind(&item.brand)
    .bind(item.status)
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns the order header for `order_id`, with empty delivery, payment and item sub-records.
pub async fn fetch_header(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            SELECT
                order_uid,
                track_number,
                entry,
                locale,
                internal_signature,
                customer_id,
                delivery_service,
                shardkey,
                sm_id,
                date_created,
                oof_shard
            FROM orders
            WHERE order_uid = $1;
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_delivery(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as(
        "SELECT name, phone, zip, city, address, region, email FROM deliveries WHERE order_uid = $1",
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(delivery)
}

pub async fn fetch_payment(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            SELECT
                transaction_id,
                request_id,
                currency,
                provider,
                amount,
                payment_dt,
                bank,
                delivery_cost,
                goods_total,
                custom_fee
            FROM payments
            WHERE order_uid = $1;
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Returns the items for `order_id` in the order they were stored.
pub async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<Item>, sqlx::Error> {
    let items: Vec<Item> = sqlx::query_as(
        r#"
            SELECT
                chrt_id,
                track_number,
                price,
                rid,
                name,
                sale,
                size,
                total_price,
                nm_id,
                brand,
                status
            FROM items
            WHERE order_uid = $1
            ORDER BY id ASC;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    trace!("📝️ {} items fetched for order {order_id}", items.len());
    Ok(items)
}

/// Reconstructs the full order aggregate from its four tables. Returns `None` if there is no header for `order_id`.
pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let Some(mut order) = fetch_header(order_id, conn).await? else {
        debug!("📝️ No order header found for {order_id}");
        return Ok(None);
    };
    order.delivery = fetch_delivery(order_id, conn).await?.unwrap_or_default();
    order.payment = fetch_payment(order_id, conn).await?.unwrap_or_default();
    order.items = fetch_items(order_id, conn).await?;
    Ok(Some(order))
}

/// Lists every order id, most recently ingested first.
pub async fn fetch_order_ids(conn: &mut SqliteConnection) -> Result<Vec<OrderId>, sqlx::Error> {
    let ids: Vec<(OrderId,)> = sqlx::query_as("SELECT order_uid FROM orders ORDER BY created_at DESC, rowid DESC")
        .fetch_all(conn)
        .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}
