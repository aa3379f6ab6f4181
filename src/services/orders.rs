//! Direct orders, order queries, approval and the sales dashboard.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Claims;
use crate::domain::aggregates::{Order, SalesReport, User};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::error::{AppError, AppResult};
use crate::notifications::{templates, Invoice};
use crate::repository::orders::{self, CategorySales};
use crate::repository::users;
use crate::services::{lock_products, persist_stock, PageMeta, Paginated};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderDetailsRef {
    pub id: Uuid,
    pub price: Decimal,
}

/// Body returned for a direct order.
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub order_details: OrderDetailsRef,
}

/// Places an order for the caller without going through the payment provider.
#[tracing::instrument(skip(state))]
pub async fn create_direct(state: &AppState, user_id: Uuid, lines: &[(Uuid, u32)]) -> AppResult<PlacedOrder> {
    if lines.is_empty() {
        return Err(AppError::bad_request("Order has no products"));
    }
    if users::find(&state.db, user_id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }
    let ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();

    let mut tx = state.db.begin().await?;
    let mut catalog = lock_products(&mut tx, &ids).await?;
    let mut order = {
        let priced: Vec<_> = lines.iter().filter_map(|(id, qty)| catalog.get(id).map(|p| (p, *qty))).collect();
        Order::place(user_id, &priced, &state.config.currency)?
    };
    order.reserve_stock(&mut catalog)?;
    persist_stock(&mut tx, &catalog).await?;
    orders::insert(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id(), %user_id, total = %order.total(), "direct order placed");
    let mut events = order.take_events();
    events.extend(catalog.values().map(|p| DomainEvent::Product(ProductEvent::StockAdjusted { product_id: p.id, stock: p.stock })));
    state.events.publish(events).await;

    Ok(PlacedOrder {
        id: order.id(),
        date: order.date(),
        order_details: OrderDetailsRef { id: order.id(), price: order.total() },
    })
}

/// An order readable by its owner or any admin.
pub async fn find_one(state: &AppState, id: Uuid, claims: &Claims) -> AppResult<Order> {
    let order = orders::find(&state.db, id).await?.ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    if order.user_id() != claims.user_id() && !claims.is_admin {
        return Err(AppError::forbidden("You can only view your own orders"));
    }
    Ok(order)
}

#[derive(Debug, Serialize)]
pub struct Buyer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for Buyer {
    fn from(u: &User) -> Self { Self { id: u.id, name: u.name.clone(), email: u.email.clone() } }
}

#[derive(Debug, Serialize)]
pub struct OrderWithBuyer {
    #[serde(flatten)]
    pub order: Order,
    pub user: Option<Buyer>,
}

pub async fn find_all(state: &AppState, page: u32, limit: u32, order_id: Option<Uuid>) -> AppResult<Paginated<OrderWithBuyer>> {
    let (found, total) = orders::list(&state.db, page, limit, order_id).await?;
    let user_ids: Vec<Uuid> = found.iter().map(Order::user_id).collect();
    let buyers = users::find_many(&state.db, &user_ids).await?;
    let data = found
        .into_iter()
        .map(|order| {
            let user = buyers.get(&order.user_id()).map(Buyer::from);
            OrderWithBuyer { order, user }
        })
        .collect();
    Ok(Paginated { data, meta: PageMeta::new(total, page, limit) })
}

pub async fn find_mine(state: &AppState, user_id: Uuid) -> AppResult<Vec<Order>> {
    orders::list_for_user(&state.db, user_id).await
}

/// Moves an order from preparation to approved and mails the invoice.
#[tracing::instrument(skip(state))]
pub async fn approve(state: &AppState, id: Uuid) -> AppResult<Order> {
    let mut order = orders::find(&state.db, id).await?.ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    order.approve()?;
    orders::save_status(&state.db, &order).await?;
    tracing::info!(order_id = %id, "order approved");

    match users::find(&state.db, order.user_id()).await? {
        Some(customer) => {
            let invoice = Invoice::for_order(&order, &customer);
            let store_mail = state.config.smtp.as_ref().map(|s| s.store_mail.as_str());
            let mail = templates::order_approved_mail(&invoice, store_mail, &state.config.frontend_url);
            if let Err(e) = state.mailer.send(mail).await {
                tracing::warn!(order_id = %id, error = %e, "approval mail not sent");
            }
        }
        None => tracing::warn!(order_id = %id, "order owner no longer exists, approval mail skipped"),
    }

    state.events.publish(order.take_events()).await;
    Ok(order)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(flatten)]
    pub report: SalesReport,
    pub sales_by_category: Vec<CategorySales>,
}

pub async fn dashboard(state: &AppState) -> AppResult<Dashboard> {
    let sales = orders::list_sales(&state.db).await?;
    let sales_by_category = orders::sales_by_category(&state.db).await?;
    Ok(Dashboard { report: SalesReport::from_orders(&sales), sales_by_category })
}
