use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub cuit: String,
    pub phone: String,
    pub email: String,
}

pub async fn list_suppliers<'e>(db: impl PgExecutor<'e>) -> sqlx::Result<Vec<Supplier>> {
    sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY name").fetch_all(db).await
}

pub async fn find_supplier<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<Option<Supplier>> {
    sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn insert_supplier<'e>(db: impl PgExecutor<'e>, s: &Supplier) -> sqlx::Result<Supplier> {
    sqlx::query_as::<_, Supplier>("INSERT INTO suppliers (id, name, cuit, phone, email) VALUES ($1, $2, $3, $4, $5) RETURNING *")
        .bind(s.id).bind(&s.name).bind(&s.cuit).bind(&s.phone).bind(&s.email)
        .fetch_one(db)
        .await
}

pub async fn save_supplier<'e>(db: impl PgExecutor<'e>, s: &Supplier) -> sqlx::Result<Option<Supplier>> {
    sqlx::query_as::<_, Supplier>("UPDATE suppliers SET name = $2, cuit = $3, phone = $4, email = $5 WHERE id = $1 RETURNING *")
        .bind(s.id).bind(&s.name).bind(&s.cuit).bind(&s.phone).bind(&s.email)
        .fetch_optional(db)
        .await
}

pub async fn delete_supplier<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<u64> {
    Ok(sqlx::query("DELETE FROM suppliers WHERE id = $1").bind(id).execute(db).await?.rows_affected())
}

pub async fn insert_stock_entry<'e>(db: impl PgExecutor<'e>, product_id: Uuid, supplier_id: Option<Uuid>, quantity: i32) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO stock_entries (id, product_id, supplier_id, quantity, created_at) VALUES ($1, $2, $3, $4, NOW())")
        .bind(Uuid::now_v7()).bind(product_id).bind(supplier_id).bind(quantity)
        .execute(db)
        .await?;
    Ok(())
}
