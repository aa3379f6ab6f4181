use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::domain::aggregates::{product::average_rating, Product};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub content: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    pub user_id: Uuid,
    pub user_email: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub created_at: DateTime<Utc>,
}

const COMMENT_COLUMNS: &str =
    "c.id, c.product_id, c.user_id, u.name AS user_name, c.content, c.rating, c.created_at FROM comments c JOIN users u ON u.id = c.user_id";

/// Inserts the comment and refreshes the product's rating aggregate. Call inside a transaction.
pub async fn insert_comment(conn: &mut PgConnection, product_id: Uuid, user_id: Uuid, content: &str, rating: i16) -> sqlx::Result<Comment> {
    // serialises rating recomputation per product
    sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE").bind(product_id).execute(&mut *conn).await?;

    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO comments (id, product_id, user_id, content, rating, created_at) VALUES ($1, $2, $3, $4, $5, NOW())")
        .bind(id).bind(product_id).bind(user_id).bind(content).bind(rating)
        .execute(&mut *conn)
        .await?;

    let ratings: Vec<(i16,)> = sqlx::query_as("SELECT rating FROM comments WHERE product_id = $1")
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;
    let ratings: Vec<i16> = ratings.into_iter().map(|r| r.0).collect();
    let total = i32::try_from(ratings.len()).unwrap_or(i32::MAX);
    super::products::set_rating(&mut *conn, product_id, average_rating(&ratings), total).await?;

    sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} WHERE c.id = $1")).bind(id).fetch_one(&mut *conn).await
}

pub async fn comments_for_product<'e>(db: impl PgExecutor<'e>, product_id: Uuid) -> sqlx::Result<Vec<Comment>> {
    sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} WHERE c.product_id = $1 ORDER BY c.created_at DESC"))
        .bind(product_id)
        .fetch_all(db)
        .await
}

/// No-op when the product is already a favorite.
pub async fn add_favorite<'e>(db: impl PgExecutor<'e>, user_id: Uuid, product_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO favorites (user_id, product_id, created_at) VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .bind(product_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn remove_favorite<'e>(db: impl PgExecutor<'e>, user_id: Uuid, product_id: Uuid) -> sqlx::Result<u64> {
    Ok(sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(db)
        .await?
        .rows_affected())
}

pub async fn favorites_for_user<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> sqlx::Result<Vec<Product>> {
    sqlx::query_as::<_, Product>(
        "SELECT p.* FROM favorites f JOIN products p ON p.id = f.product_id WHERE f.user_id = $1 ORDER BY f.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn all_favorites<'e>(db: impl PgExecutor<'e>) -> sqlx::Result<Vec<FavoriteEntry>> {
    sqlx::query_as::<_, FavoriteEntry>(
        "SELECT f.user_id, u.email AS user_email, f.product_id, p.name AS product_name, f.created_at \
         FROM favorites f JOIN users u ON u.id = f.user_id JOIN products p ON p.id = f.product_id ORDER BY f.created_at DESC",
    )
    .fetch_all(db)
    .await
}
