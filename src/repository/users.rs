use std::collections::HashMap;

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::page_bounds;
use crate::domain::aggregates::User;

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn find_many<'e>(db: impl PgExecutor<'e>, ids: &[Uuid]) -> sqlx::Result<HashMap<Uuid, User>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)").bind(ids).fetch_all(db).await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

pub async fn find_by_email<'e>(db: impl PgExecutor<'e>, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(db).await
}

pub async fn find_by_verification_token<'e>(db: impl PgExecutor<'e>, token: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE verification_token = $1").bind(token).fetch_optional(db).await
}

pub async fn insert<'e>(db: impl PgExecutor<'e>, user: &User) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash, phone, country, address, city, img_url, is_admin, is_super_admin, is_banned, is_verified, verification_token, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING *",
    )
    .bind(user.id).bind(&user.name).bind(&user.email).bind(&user.password_hash)
    .bind(&user.phone).bind(&user.country).bind(&user.address).bind(&user.city).bind(&user.img_url)
    .bind(user.is_admin).bind(user.is_super_admin).bind(user.is_banned).bind(user.is_verified)
    .bind(&user.verification_token).bind(user.created_at).bind(user.updated_at)
    .fetch_one(db)
    .await
}

pub async fn save<'e>(db: impl PgExecutor<'e>, user: &User) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET name = $2, email = $3, password_hash = $4, phone = $5, country = $6, address = $7, city = $8, \
         img_url = $9, is_admin = $10, is_banned = $11, is_verified = $12, verification_token = $13, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(user.id).bind(&user.name).bind(&user.email).bind(&user.password_hash)
    .bind(&user.phone).bind(&user.country).bind(&user.address).bind(&user.city).bind(&user.img_url)
    .bind(user.is_admin).bind(user.is_banned).bind(user.is_verified).bind(&user.verification_token)
    .fetch_one(db)
    .await
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<u64> {
    Ok(sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(db).await?.rows_affected())
}

/// Page of users; `search` matches name or email (case-insensitive) or the exact id.
pub async fn list(db: &PgPool, page: u32, limit: u32, search: Option<&str>) -> sqlx::Result<(Vec<User>, i64)> {
    let (lim, offset) = page_bounds(page, limit);
    let pattern = search.map(|s| format!("%{}%", s.trim()));
    let exact_id = search.and_then(|s| Uuid::parse_str(s.trim()).ok());
    let filter = "($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1 OR id = $2)";
    let users = sqlx::query_as::<_, User>(&format!("SELECT * FROM users WHERE {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"))
        .bind(&pattern).bind(exact_id).bind(lim).bind(offset)
        .fetch_all(db)
        .await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
        .bind(&pattern).bind(exact_id)
        .fetch_one(db)
        .await?;
    Ok((users, total.0))
}
