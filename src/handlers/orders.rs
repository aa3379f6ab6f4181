use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::PageParams;
use crate::auth::{AdminUser, CurrentUser};
use crate::domain::aggregates::order::{ProductSales, SalesSummary};
use crate::domain::aggregates::Order;
use crate::error::{AppError, AppResult};
use crate::repository::orders::CategorySales;
use crate::services::orders::{self as service, Dashboard, OrderWithBuyer, PlacedOrder};
use crate::services::Paginated;
use crate::state::AppState;

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct OrderProduct {
    pub id: Uuid,
    #[serde(default = "one")]
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub products: Vec<OrderProduct>,
}

impl CreateOrderRequest {
    fn lines(&self) -> AppResult<Vec<(Uuid, u32)>> {
        if self.products.is_empty() {
            return Err(AppError::bad_request("Order has no products"));
        }
        self.products
            .iter()
            .map(|p| {
                p.validate()?;
                Ok((p.id, p.quantity))
            })
            .collect()
    }
}

pub async fn create(
    State(s): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(r): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<PlacedOrder>)> {
    let lines = r.lines()?;
    let placed = service::create_direct(&s, caller.user_id(), &lines).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub order_id: Option<Uuid>,
}

pub async fn find_all(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Query(q): Query<OrderListParams>,
) -> AppResult<Json<Paginated<OrderWithBuyer>>> {
    let (page, limit) = PageParams { page: q.page, limit: q.limit }.resolve(10)?;
    Ok(Json(service::find_all(&s, page, limit, q.order_id).await?))
}

pub async fn find_mine(State(s): State<AppState>, CurrentUser(caller): CurrentUser) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(service::find_mine(&s, caller.user_id()).await?))
}

pub async fn find_one(State(s): State<AppState>, CurrentUser(caller): CurrentUser, Path(id): Path<Uuid>) -> AppResult<Json<Order>> {
    Ok(Json(service::find_one(&s, id, &caller).await?))
}

/// `PATCH /orders/:id/status`: moves a prepared order to approved and mails
/// the invoice.
pub async fn approve(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<Order>> {
    Ok(Json(service::approve(&s, id).await?))
}

pub async fn dashboard(State(s): State<AppState>, AdminUser(_): AdminUser) -> AppResult<Json<Dashboard>> {
    Ok(Json(service::dashboard(&s).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(flatten)]
    pub summary: SalesSummary,
    pub best_seller: Option<ProductSales>,
}

impl From<Dashboard> for DashboardSummary {
    fn from(dashboard: Dashboard) -> Self {
        let best_seller = dashboard.report.sales.iter().max_by_key(|s| s.total_quantity).cloned();
        Self { summary: dashboard.report.summary, best_seller }
    }
}

pub async fn summary(State(s): State<AppState>, AdminUser(_): AdminUser) -> AppResult<Json<DashboardSummary>> {
    Ok(Json(service::dashboard(&s).await?.into()))
}

pub async fn sales_by_category(State(s): State<AppState>, AdminUser(_): AdminUser) -> AppResult<Json<Vec<CategorySales>>> {
    Ok(Json(service::dashboard(&s).await?.sales_by_category))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_request_defaults_quantity() {
        let r: CreateOrderRequest = serde_json::from_str(&format!(r#"{{"products":[{{"id":"{}"}}]}}"#, Uuid::nil())).unwrap();
        assert_eq!(r.lines().unwrap(), vec![(Uuid::nil(), 1)]);

        let empty: CreateOrderRequest = serde_json::from_str(r#"{"products":[]}"#).unwrap();
        assert!(empty.lines().is_err());

        let zero: CreateOrderRequest =
            serde_json::from_str(&format!(r#"{{"products":[{{"id":"{}","quantity":0}}]}}"#, Uuid::nil())).unwrap();
        assert!(zero.lines().is_err());
    }
}
