//! Stock entries and suppliers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::aggregates::Product;
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::error::{AppError, AppResult};
use crate::repository::inventory::{self, Supplier};
use crate::repository::products;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddStockRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
    pub supplier_id: Option<Uuid>,
}

/// Receives goods: increments stock and records the entry.
pub async fn add_stock(State(s): State<AppState>, AdminUser(_): AdminUser, Json(r): Json<AddStockRequest>) -> AppResult<Json<Product>> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    if let Some(supplier_id) = r.supplier_id {
        if inventory::find_supplier(&mut *tx, supplier_id).await?.is_none() {
            return Err(AppError::not_found("Supplier not found"));
        }
    }
    let mut catalog = products::lock_many(&mut tx, &[r.product_id]).await?;
    let product = catalog.get_mut(&r.product_id).ok_or_else(|| AppError::not_found("Product not found"))?;
    product.add_stock(r.quantity)?;
    products::set_stock(&mut *tx, product.id, product.stock).await?;
    let quantity = i32::try_from(r.quantity).map_err(|_| AppError::bad_request("quantity out of range"))?;
    inventory::insert_stock_entry(&mut *tx, product.id, r.supplier_id, quantity).await?;
    tx.commit().await?;

    let product = product.clone();
    tracing::info!(product_id = %product.id, added = r.quantity, stock = product.stock, "stock received");
    s.events.publish(vec![DomainEvent::Product(ProductEvent::StockAdjusted { product_id: product.id, stock: product.stock })]).await;
    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub quantity: u32,
}

/// Absolute stock correction.
pub async fn set_stock(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(product_id): Path<Uuid>,
    Json(r): Json<SetStockRequest>,
) -> AppResult<Json<Product>> {
    let mut tx = s.db.begin().await?;
    let mut catalog = products::lock_many(&mut tx, &[product_id]).await?;
    let mut product = catalog.remove(&product_id).ok_or_else(|| AppError::not_found("Product not found"))?;
    product.set_stock(r.quantity)?;
    products::set_stock(&mut *tx, product.id, product.stock).await?;
    tx.commit().await?;

    tracing::info!(product_id = %product.id, stock = product.stock, "stock set");
    s.events.publish(vec![DomainEvent::Product(ProductEvent::StockAdjusted { product_id: product.id, stock: product.stock })]).await;
    Ok(Json(product))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SupplierRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(min = 11, max = 13, message = "cuit must be 11 digits, dashes allowed"))]
    pub cuit: String,
    #[validate(length(min = 6, max = 20))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
}

impl SupplierRequest {
    fn into_supplier(self, id: Uuid) -> Supplier {
        Supplier { id, name: self.name.trim().to_string(), cuit: self.cuit, phone: self.phone, email: self.email }
    }
}

pub async fn list_suppliers(State(s): State<AppState>, AdminUser(_): AdminUser) -> AppResult<Json<Vec<Supplier>>> {
    Ok(Json(inventory::list_suppliers(&s.db).await?))
}

pub async fn get_supplier(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<Supplier>> {
    inventory::find_supplier(&s.db, id).await?.map(Json).ok_or_else(|| AppError::not_found("Supplier not found"))
}

pub async fn create_supplier(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Json(r): Json<SupplierRequest>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    r.validate()?;
    let supplier = inventory::insert_supplier(&s.db, &r.into_supplier(Uuid::now_v7())).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn update_supplier(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<SupplierRequest>,
) -> AppResult<Json<Supplier>> {
    r.validate()?;
    inventory::save_supplier(&s.db, &r.into_supplier(id)).await?.map(Json).ok_or_else(|| AppError::not_found("Supplier not found"))
}

pub async fn delete_supplier(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if inventory::delete_supplier(&s.db, id).await? == 0 {
        return Err(AppError::not_found("Supplier not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
