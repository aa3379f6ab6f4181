use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{categories::Category, page_bounds};
use crate::domain::aggregates::Product;

/// Catalog search criteria; every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub brands: Vec<String>,
    pub models: Vec<String>,
    pub engines: Vec<String>,
    pub category_id: Option<Uuid>,
    pub in_stock: Option<bool>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub brands: Vec<String>,
    pub models: Vec<String>,
    pub engines: Vec<String>,
    pub categories: Vec<Category>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" FROM products p LEFT JOIN categories c ON c.id = p.category_id WHERE TRUE");
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (p.name ILIKE ").push_bind(pattern.clone())
            .push(" OR p.brand ILIKE ").push_bind(pattern.clone())
            .push(" OR p.model ILIKE ").push_bind(pattern.clone())
            .push(" OR p.description ILIKE ").push_bind(pattern.clone())
            .push(" OR p.engine ILIKE ").push_bind(pattern.clone())
            .push(" OR c.name ILIKE ").push_bind(pattern.clone())
            .push(" OR CAST(p.year AS TEXT) ILIKE ").push_bind(pattern)
            .push(")");
    }
    if !filter.brands.is_empty() {
        qb.push(" AND p.brand = ANY(").push_bind(filter.brands.clone()).push(")");
    }
    if !filter.models.is_empty() {
        qb.push(" AND p.model = ANY(").push_bind(filter.models.clone()).push(")");
    }
    if !filter.engines.is_empty() {
        qb.push(" AND p.engine = ANY(").push_bind(filter.engines.clone()).push(")");
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND p.category_id = ").push_bind(category_id);
    }
    match filter.in_stock {
        Some(true) => { qb.push(" AND p.stock > 0"); }
        Some(false) => { qb.push(" AND p.stock <= 0"); }
        None => {}
    }
    if let Some(v) = filter.year_min { qb.push(" AND p.year >= ").push_bind(v); }
    if let Some(v) = filter.year_max { qb.push(" AND p.year <= ").push_bind(v); }
    if let Some(v) = filter.price_min { qb.push(" AND p.price >= ").push_bind(v); }
    if let Some(v) = filter.price_max { qb.push(" AND p.price <= ").push_bind(v); }
}

pub async fn find_with_filters(db: &PgPool, filter: &ProductFilter) -> sqlx::Result<(Vec<Product>, i64)> {
    let (limit, offset) = page_bounds(filter.page, filter.limit);

    let mut qb = QueryBuilder::<Postgres>::new("SELECT p.*");
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY p.name ASC LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
    let items = qb.build_query_as::<Product>().fetch_all(db).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    push_filters(&mut count, filter);
    let total: (i64,) = count.build_query_as().fetch_one(db).await?;
    Ok((items, total.0))
}

pub async fn facets(db: &PgPool) -> sqlx::Result<Facets> {
    let distinct = |column: &'static str| {
        format!("SELECT DISTINCT {column} FROM products WHERE {column} IS NOT NULL AND {column} <> '' ORDER BY {column}")
    };
    let brands: Vec<(String,)> = sqlx::query_as(&distinct("brand")).fetch_all(db).await?;
    let models: Vec<(String,)> = sqlx::query_as(&distinct("model")).fetch_all(db).await?;
    let engines: Vec<(String,)> = sqlx::query_as(&distinct("engine")).fetch_all(db).await?;
    let categories = super::categories::list(db).await?;
    Ok(Facets {
        brands: brands.into_iter().map(|r| r.0).collect(),
        models: models.into_iter().map(|r| r.0).collect(),
        engines: engines.into_iter().map(|r| r.0).collect(),
        categories,
    })
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn find_by_name<'e>(db: impl PgExecutor<'e>, name: &str) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE name = $1").bind(name).fetch_optional(db).await
}

pub async fn find_many<'e>(db: impl PgExecutor<'e>, ids: &[Uuid]) -> sqlx::Result<HashMap<Uuid, Product>> {
    let rows = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)").bind(ids).fetch_all(db).await?;
    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

pub async fn lock(conn: &mut PgConnection, id: Uuid) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE").bind(id).fetch_optional(conn).await
}

/// Locks the rows in id order so concurrent settlements cannot deadlock.
pub async fn lock_many(conn: &mut PgConnection, ids: &[Uuid]) -> sqlx::Result<HashMap<Uuid, Product>> {
    let rows = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(ids)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

pub async fn insert<'e>(db: impl PgExecutor<'e>, p: &Product) -> sqlx::Result<Product> {
    sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, description, price, stock, img_url, year, brand, model, engine, category_id, average_rating, total_reviews, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING *",
    )
    .bind(p.id).bind(&p.name).bind(&p.description).bind(p.price).bind(p.stock).bind(&p.img_url)
    .bind(p.year).bind(&p.brand).bind(&p.model).bind(&p.engine).bind(p.category_id)
    .bind(p.average_rating).bind(p.total_reviews).bind(p.created_at).bind(p.updated_at)
    .fetch_one(db)
    .await
}

/// Writes every editable column back. Read the product with [`lock`] in the
/// same transaction, or a concurrent stock change is lost.
pub async fn save(conn: &mut PgConnection, p: &Product) -> sqlx::Result<Product> {
    sqlx::query_as::<_, Product>(
        "UPDATE products SET name = $2, description = $3, price = $4, stock = $5, img_url = $6, year = $7, brand = $8, \
         model = $9, engine = $10, category_id = $11, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(p.id).bind(&p.name).bind(&p.description).bind(p.price).bind(p.stock).bind(&p.img_url)
    .bind(p.year).bind(&p.brand).bind(&p.model).bind(&p.engine).bind(p.category_id)
    .fetch_one(conn)
    .await
}

pub async fn set_stock<'e>(db: impl PgExecutor<'e>, id: Uuid, stock: i32) -> sqlx::Result<()> {
    sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1").bind(id).bind(stock).execute(db).await?;
    Ok(())
}

pub async fn set_img_url<'e>(db: impl PgExecutor<'e>, id: Uuid, url: &str) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>("UPDATE products SET img_url = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(url)
        .fetch_optional(db)
        .await
}

pub async fn set_rating<'e>(db: impl PgExecutor<'e>, id: Uuid, average: Decimal, total: i32) -> sqlx::Result<()> {
    sqlx::query("UPDATE products SET average_rating = $2, total_reviews = $3 WHERE id = $1")
        .bind(id).bind(average).bind(total)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<u64> {
    Ok(sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(db).await?.rows_affected())
}
