use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::page_bounds;
use crate::domain::aggregates::{Order, OrderItem, OrderRecord};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategorySales {
    pub category: Option<String>,
    pub total_sales: Decimal,
}

pub async fn insert(conn: &mut PgConnection, order: &Order) -> sqlx::Result<()> {
    let r = order.record();
    sqlx::query(
        "INSERT INTO orders (id, user_id, date, status, payment_status, total, currency, mp_preference_id, mp_payment_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(r.id).bind(r.user_id).bind(r.date).bind(&r.status).bind(&r.payment_status)
    .bind(r.total).bind(&r.currency).bind(&r.mp_preference_id).bind(&r.mp_payment_id)
    .execute(&mut *conn)
    .await?;
    for item in order.items() {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(item.id).bind(r.id).bind(item.product_id).bind(&item.product_name).bind(item.quantity).bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn save_status<'e>(db: impl PgExecutor<'e>, order: &Order) -> sqlx::Result<()> {
    let r = order.record();
    sqlx::query("UPDATE orders SET status = $2, payment_status = $3, mp_payment_id = $4 WHERE id = $1")
        .bind(r.id).bind(&r.status).bind(&r.payment_status).bind(&r.mp_payment_id)
        .execute(db)
        .await?;
    Ok(())
}

async fn with_items<'e>(db: impl PgExecutor<'e>, records: Vec<OrderRecord>) -> Result<Vec<Order>, AppError> {
    let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY product_name")
        .bind(&ids)
        .fetch_all(db)
        .await?;
    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    records
        .into_iter()
        .map(|r| {
            let items = grouped.remove(&r.id).unwrap_or_default();
            Order::from_record(r, items).map_err(AppError::from)
        })
        .collect()
}

async fn find_where(db: &PgPool, clause: &str, value: &str) -> Result<Option<Order>, AppError> {
    let record = sqlx::query_as::<_, OrderRecord>(&format!("SELECT * FROM orders WHERE {clause} = $1 LIMIT 1"))
        .bind(value)
        .fetch_optional(db)
        .await?;
    match record {
        Some(r) => Ok(with_items(db, vec![r]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn find(db: &PgPool, id: Uuid) -> Result<Option<Order>, AppError> {
    let record = sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(db).await?;
    match record {
        Some(r) => Ok(with_items(db, vec![r]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn find_by_payment_id(db: &PgPool, payment_id: &str) -> Result<Option<Order>, AppError> {
    find_where(db, "mp_payment_id", payment_id).await
}

pub async fn find_by_preference_id(db: &PgPool, preference_id: &str) -> Result<Option<Order>, AppError> {
    find_where(db, "mp_preference_id", preference_id).await
}

pub async fn list(db: &PgPool, page: u32, limit: u32, order_id: Option<Uuid>) -> Result<(Vec<Order>, i64), AppError> {
    let (lim, offset) = page_bounds(page, limit);
    let records = sqlx::query_as::<_, OrderRecord>(
        "SELECT * FROM orders WHERE ($1::uuid IS NULL OR id = $1) ORDER BY date DESC LIMIT $2 OFFSET $3",
    )
    .bind(order_id).bind(lim).bind(offset)
    .fetch_all(db)
    .await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::uuid IS NULL OR id = $1)")
        .bind(order_id)
        .fetch_one(db)
        .await?;
    Ok((with_items(db, records).await?, total.0))
}

pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> Result<Vec<Order>, AppError> {
    let records = sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE user_id = $1 ORDER BY date DESC")
        .bind(user_id)
        .fetch_all(db)
        .await?;
    with_items(db, records).await
}

/// Orders that count as sales, for the dashboard.
pub async fn list_sales(db: &PgPool) -> Result<Vec<Order>, AppError> {
    let records = sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE status IN ('approved', 'completed') ORDER BY date")
        .fetch_all(db)
        .await?;
    with_items(db, records).await
}

pub async fn sales_by_category(db: &PgPool) -> sqlx::Result<Vec<CategorySales>> {
    sqlx::query_as::<_, CategorySales>(
        "SELECT c.name AS category, COALESCE(SUM(oi.unit_price * oi.quantity), 0) AS total_sales \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         LEFT JOIN products p ON p.id = oi.product_id \
         LEFT JOIN categories c ON c.id = p.category_id \
         WHERE o.status IN ('approved', 'completed') \
         GROUP BY c.name ORDER BY total_sales DESC",
    )
    .fetch_all(db)
    .await
}
