use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

pub async fn list<'e>(db: impl PgExecutor<'e>) -> sqlx::Result<Vec<Category>> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name").fetch_all(db).await
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<Option<Category>> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn insert<'e>(db: impl PgExecutor<'e>, name: &str) -> sqlx::Result<Category> {
    sqlx::query_as::<_, Category>("INSERT INTO categories (id, name, created_at) VALUES ($1, $2, NOW()) RETURNING *")
        .bind(Uuid::now_v7())
        .bind(name.trim())
        .fetch_one(db)
        .await
}
