use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, CartRecord};
use crate::error::AppError;

async fn lines<'e>(db: impl PgExecutor<'e>, cart_id: Uuid) -> sqlx::Result<Vec<CartLine>> {
    sqlx::query_as::<_, CartLine>(
        "SELECT id, product_id, quantity, unit_price_at_add, unit_price_current, product_name_snapshot, \
         image_url_snapshot, is_valid, created_at FROM cart_items WHERE cart_id = $1 ORDER BY created_at, id",
    )
    .bind(cart_id)
    .fetch_all(db)
    .await
}

async fn hydrate(conn: &mut PgConnection, record: Option<CartRecord>) -> Result<Option<Cart>, AppError> {
    let Some(record) = record else { return Ok(None) };
    let items = lines(&mut *conn, record.id).await?;
    Ok(Some(Cart::from_record(record, items)?))
}

pub async fn find(db: &PgPool, id: Uuid) -> Result<Option<Cart>, AppError> {
    let mut conn = db.acquire().await?;
    let record = sqlx::query_as::<_, CartRecord>("SELECT * FROM carts WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    hydrate(&mut conn, record).await
}

/// Anonymous carts only; a user's cart is never reachable through the cookie.
pub async fn find_guest(db: &PgPool, id: Uuid) -> Result<Option<Cart>, AppError> {
    let mut conn = db.acquire().await?;
    let record = sqlx::query_as::<_, CartRecord>("SELECT * FROM carts WHERE id = $1 AND user_id IS NULL")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    hydrate(&mut conn, record).await
}

pub async fn find_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<Cart>, AppError> {
    let record = sqlx::query_as::<_, CartRecord>("SELECT * FROM carts WHERE user_id = $1").bind(user_id).fetch_optional(&mut *conn).await?;
    hydrate(conn, record).await
}

/// Inserts an empty cart for its user unless the user already has one.
pub async fn insert_for_user(conn: &mut PgConnection, cart: &Cart) -> sqlx::Result<()> {
    let r = cart.record();
    sqlx::query(
        "INSERT INTO carts (id, user_id, status, subtotal, total, needs_attention, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (user_id) WHERE user_id IS NOT NULL DO NOTHING",
    )
    .bind(r.id).bind(r.user_id).bind(&r.status).bind(r.subtotal).bind(r.total).bind(r.needs_attention)
    .bind(r.created_at).bind(r.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Cart>, AppError> {
    let record = sqlx::query_as::<_, CartRecord>("SELECT * FROM carts WHERE id = $1 FOR UPDATE").bind(id).fetch_optional(&mut *conn).await?;
    hydrate(conn, record).await
}

/// Upserts the cart row and replaces its lines. Call inside a transaction.
pub async fn save(conn: &mut PgConnection, cart: &Cart) -> sqlx::Result<()> {
    let r = cart.record();
    sqlx::query(
        "INSERT INTO carts (id, user_id, status, subtotal, total, mp_preference_id, mp_payment_id, needs_attention, last_validated_at, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (id) DO UPDATE SET user_id = EXCLUDED.user_id, status = EXCLUDED.status, subtotal = EXCLUDED.subtotal, \
         total = EXCLUDED.total, mp_preference_id = EXCLUDED.mp_preference_id, mp_payment_id = EXCLUDED.mp_payment_id, \
         needs_attention = EXCLUDED.needs_attention, last_validated_at = EXCLUDED.last_validated_at, updated_at = EXCLUDED.updated_at",
    )
    .bind(r.id).bind(r.user_id).bind(&r.status).bind(r.subtotal).bind(r.total)
    .bind(&r.mp_preference_id).bind(&r.mp_payment_id).bind(r.needs_attention).bind(r.last_validated_at)
    .bind(r.created_at).bind(r.updated_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(r.id).execute(&mut *conn).await?;
    for line in cart.lines() {
        sqlx::query(
            "INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price_at_add, unit_price_current, product_name_snapshot, image_url_snapshot, is_valid, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(line.id).bind(r.id).bind(line.product_id).bind(line.quantity)
        .bind(line.unit_price_at_add).bind(line.unit_price_current)
        .bind(&line.product_name_snapshot).bind(&line.image_url_snapshot).bind(line.is_valid).bind(line.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM carts WHERE id = $1").bind(id).execute(db).await?;
    Ok(())
}
