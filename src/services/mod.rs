//! Use cases that span several aggregates, a transaction or an integration.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::aggregates::Product;
use crate::error::AppError;
use crate::repository::products as product_repo;

/// Locks the given products for the rest of the transaction, failing with
/// 404 when any of them no longer exists.
pub(crate) async fn lock_products(conn: &mut PgConnection, ids: &[Uuid]) -> Result<HashMap<Uuid, Product>, AppError> {
    let locked = product_repo::lock_many(conn, ids).await?;
    if let Some(missing) = ids.iter().find(|id| !locked.contains_key(id)) {
        return Err(AppError::not_found(format!("Product {missing} not found")));
    }
    Ok(locked)
}

/// Writes back the stock of every product in `catalog`.
pub(crate) async fn persist_stock(conn: &mut PgConnection, catalog: &HashMap<Uuid, Product>) -> sqlx::Result<()> {
    for product in catalog.values() {
        product_repo::set_stock(&mut *conn, product.id, product.stock).await?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(total: i64, page: u32, limit: u32) -> Self {
        let per_page = i64::from(limit.max(1));
        Self { total, page, limit, total_pages: (total + per_page - 1) / per_page }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_meta_rounds_up() {
        assert_eq!(PageMeta::new(21, 1, 10).total_pages, 3);
        assert_eq!(PageMeta::new(0, 1, 10).total_pages, 0);
        assert_eq!(PageMeta::new(10, 1, 10).total_pages, 1);
    }
}
