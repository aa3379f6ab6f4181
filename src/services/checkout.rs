//! Checkout: payment preferences and turning paid carts into orders.
//!
//! Settlement is idempotent. The provider may notify the same payment many
//! times and concurrently; `orders.mp_payment_id` is unique, so whichever
//! request commits second lands on the already-processed path.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::aggregates::{Cart, Order, OrderDraft, PaymentRef, Product};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::error::{AppError, AppResult};
use crate::payments::webhook::{choose_payment, Notification};
use crate::payments::{BackUrls, Payment, PaymentDecision, PaymentError, PreferenceItem, PreferenceRequest};
use crate::repository::{carts, orders, products};
use crate::services::persist_stock;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CheckoutPreference {
    pub init_point: String,
    pub preference_id: String,
}

/// Validates the caller's cart and asks the provider for a checkout link.
#[tracing::instrument(skip(state))]
pub async fn create_preference(state: &AppState, cart_id: Uuid, user_id: Uuid) -> AppResult<CheckoutPreference> {
    let mut tx = state.db.begin().await?;
    let mut cart = carts::lock(&mut tx, cart_id).await?.ok_or_else(|| AppError::not_found("Cart not found"))?;
    if !cart.belongs_to(user_id) {
        return Err(AppError::forbidden("Cart does not belong to the current user"));
    }
    let catalog = products::find_many(&mut *tx, &cart.product_ids()).await?;
    let draft = match cart.prepare_checkout(&catalog, &state.config.currency) {
        Ok(draft) => draft,
        Err(e) => {
            carts::save(&mut tx, &cart).await?;
            tx.commit().await?;
            return Err(e.into());
        }
    };

    let request = preference_request(&state.config, &cart, &draft, &catalog);
    let preference = state.payments.create_preference(&request).await?;
    let init_point = preference
        .checkout_url()
        .ok_or_else(|| PaymentError::UnexpectedResponse("preference without init_point".into()))?
        .to_string();

    cart.begin_payment(preference.id.clone());
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;
    tracing::info!(cart_id = %cart.id(), preference_id = %preference.id, "payment preference created");
    Ok(CheckoutPreference { init_point, preference_id: preference.id })
}

pub(crate) fn preference_request(config: &Config, cart: &Cart, draft: &OrderDraft, catalog: &HashMap<Uuid, Product>) -> PreferenceRequest {
    let items = draft
        .items
        .iter()
        .map(|item| {
            let product = catalog.get(&item.product_id);
            PreferenceItem {
                id: item.product_id.to_string(),
                title: item.name.clone(),
                description: product.and_then(|p| p.description.clone()),
                quantity: item.quantity,
                unit_price: item.unit_price.to_f64().unwrap_or_default(),
                currency_id: draft.currency.clone(),
                picture_url: product.and_then(|p| p.img_url.clone()),
            }
        })
        .collect();
    let home = format!("{}/home", config.frontend_url);
    PreferenceRequest {
        items,
        external_reference: cart.id().to_string(),
        notification_url: format!("{}/payments/webhook", config.app_base_url),
        back_urls: BackUrls { success: home.clone(), failure: home.clone(), pending: home },
        auto_return: "approved".into(),
    }
}

/// Outcome of applying one provider payment to the cart it references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    AlreadyProcessed(Uuid),
    OrderCreated(Uuid),
    CartReopened,
    Held,
    Ignored,
    StockConflict,
    /// The payment was approved for a different state of the cart.
    PaymentMismatch,
}

#[tracing::instrument(skip(state, payment), fields(payment_id = %payment.id, status = %payment.status))]
pub async fn settle_payment(state: &AppState, payment: &Payment) -> AppResult<Settlement> {
    if let Some(order) = orders::find_by_payment_id(&state.db, &payment.id).await? {
        return Ok(Settlement::AlreadyProcessed(order.id()));
    }
    let Some(cart_ref) = payment.external_reference.as_deref().filter(|r| !r.is_empty()) else {
        tracing::warn!("payment without external_reference");
        return Ok(Settlement::Ignored);
    };
    let Ok(cart_id) = Uuid::parse_str(cart_ref) else {
        tracing::warn!(%cart_ref, "external_reference is not a cart id");
        return Ok(Settlement::Ignored);
    };

    match PaymentDecision::from_status(&payment.status, state.config.force_payment_success) {
        PaymentDecision::Approve => create_order(state, cart_id, payment).await,
        PaymentDecision::Reject => {
            let mut tx = state.db.begin().await?;
            let Some(mut cart) = carts::lock(&mut tx, cart_id).await? else { return Ok(Settlement::Ignored) };
            cart.reopen();
            carts::save(&mut tx, &cart).await?;
            tx.commit().await?;
            tracing::info!(%cart_id, "payment rejected, cart reopened");
            Ok(Settlement::CartReopened)
        }
        PaymentDecision::Hold => {
            let mut tx = state.db.begin().await?;
            let Some(mut cart) = carts::lock(&mut tx, cart_id).await? else { return Ok(Settlement::Ignored) };
            cart.record_payment_attempt(payment.id.as_str());
            carts::save(&mut tx, &cart).await?;
            tx.commit().await?;
            tracing::info!(%cart_id, "payment not settled yet");
            Ok(Settlement::Held)
        }
    }
}

async fn create_order(state: &AppState, cart_id: Uuid, payment: &Payment) -> AppResult<Settlement> {
    let payment_id = payment.id.as_str();
    let mut tx = state.db.begin().await?;
    let Some(mut cart) = carts::lock(&mut tx, cart_id).await? else {
        tx.rollback().await?;
        // a concurrent notification for the same payment may have just consumed the cart
        if let Some(existing) = orders::find_by_payment_id(&state.db, payment_id).await? {
            return Ok(Settlement::AlreadyProcessed(existing.id()));
        }
        tracing::warn!(%cart_id, "approved payment for an unknown cart");
        return Ok(Settlement::Ignored);
    };
    if let Err(mismatch) = cart.check_payment(payment.transaction_amount) {
        cart.flag_payment(payment_id);
        carts::save(&mut tx, &cart).await?;
        tx.commit().await?;
        tracing::error!(%cart_id, error = %mismatch, "approved payment does not match the cart");
        return Ok(Settlement::PaymentMismatch);
    }
    let reference = PaymentRef { preference_id: cart.preference_id().map(str::to_string), payment_id: Some(payment_id.to_string()) };
    let mut order = Order::from_paid_cart(&cart, reference, &state.config.currency)?;

    let mut catalog = products::lock_many(&mut tx, &cart.product_ids()).await?;
    if let Err(e) = order.reserve_stock(&mut catalog) {
        tx.rollback().await?;
        tracing::error!(%cart_id, error = %e, "paid cart no longer fits stock");
        flag_cart(state, cart_id, payment_id).await?;
        return Ok(Settlement::StockConflict);
    }
    persist_stock(&mut tx, &catalog).await?;

    if let Err(e) = orders::insert(&mut tx, &order).await {
        if is_unique_violation(&e) {
            tx.rollback().await?;
            return match orders::find_by_payment_id(&state.db, payment_id).await? {
                Some(existing) => Ok(Settlement::AlreadyProcessed(existing.id())),
                None => Err(e.into()),
            };
        }
        return Err(e.into());
    }
    carts::delete(&mut *tx, cart.id()).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id(), %cart_id, total = %order.total(), "order created from payment");
    let mut events = order.take_events();
    events.extend(catalog.values().map(|p| DomainEvent::Product(ProductEvent::StockAdjusted { product_id: p.id, stock: p.stock })));
    state.events.publish(events).await;
    Ok(Settlement::OrderCreated(order.id()))
}

async fn flag_cart(state: &AppState, cart_id: Uuid, payment_id: &str) -> AppResult<()> {
    let mut tx = state.db.begin().await?;
    if let Some(mut cart) = carts::lock(&mut tx, cart_id).await? {
        cart.flag_payment(payment_id);
        carts::save(&mut tx, &cart).await?;
    }
    tx.commit().await?;
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Resolves a webhook notification to a payment and settles it.
///
/// Never fails: the provider retries anything that is not a 2xx, and none of
/// the failures here get better by retrying.
#[tracing::instrument(skip(state))]
pub async fn handle_notification(state: &AppState, notification: Notification) {
    let payment_id = match notification {
        Notification::Payment(id) => id,
        Notification::MerchantOrder(id) => match state.payments.get_merchant_order(&id).await {
            Ok(merchant_order) => match choose_payment(&merchant_order.payments) {
                Some(p) => p.id.clone(),
                None => {
                    tracing::info!(merchant_order_id = %id, "merchant order has no payments yet");
                    return;
                }
            },
            Err(e) => {
                tracing::warn!(merchant_order_id = %id, error = %e, "could not fetch merchant order");
                return;
            }
        },
        Notification::Other { topic, id } => {
            tracing::debug!(%topic, %id, "ignoring notification");
            return;
        }
    };

    let payment = match state.payments.get_payment(&payment_id).await {
        Ok(payment) => payment,
        Err(e) => {
            tracing::warn!(%payment_id, error = %e, "could not fetch payment");
            return;
        }
    };
    match settle_payment(state, &payment).await {
        Ok(outcome) => tracing::info!(%payment_id, ?outcome, "payment notification processed"),
        Err(e) => tracing::error!(%payment_id, error = %e, "payment settlement failed"),
    }
}

/// Records the status the buyer was redirected with on the order created
/// for that preference.
#[tracing::instrument(skip(state))]
pub async fn confirm_payment(state: &AppState, status: &str, payment_id: Option<String>, preference_id: &str) -> AppResult<Order> {
    let mut order = orders::find_by_preference_id(&state.db, preference_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found for preference"))?;
    order.set_payment_status(status, payment_id);
    orders::save_status(&state.db, &order).await?;
    Ok(order)
}
