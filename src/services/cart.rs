//! Cart resolution, editing and reconciliation.
//!
//! Every mutation runs in its own transaction holding the cart row lock, so
//! two tabs editing the same cart serialise instead of overwriting each other.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartChange, CartView, OrderDraft};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::error::{AppError, AppResult};
use crate::repository::{carts, products};
use crate::state::AppState;

/// What the response has to do with the `cart_id` cookie.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CookieUpdate {
    Keep,
    Set(Uuid),
    Clear,
}

#[derive(Debug)]
pub struct ResolvedCart {
    pub cart: Cart,
    pub cookie: CookieUpdate,
}

/// Finds the cart the request works on.
///
/// A signed-in user always gets their own cart; a guest cart still referenced
/// by the cookie is merged into it and the cookie is dropped.
#[tracing::instrument(skip(state))]
pub async fn resolve(state: &AppState, user_id: Option<Uuid>, cookie_cart: Option<Uuid>) -> AppResult<ResolvedCart> {
    match user_id {
        Some(user_id) => resolve_for_user(state, user_id, cookie_cart).await,
        None => resolve_for_guest(state, cookie_cart).await,
    }
}

async fn resolve_for_user(state: &AppState, user_id: Uuid, cookie_cart: Option<Uuid>) -> AppResult<ResolvedCart> {
    let mut tx = state.db.begin().await?;
    let mut cart = match carts::find_for_user(&mut tx, user_id).await? {
        Some(cart) => cart,
        None => {
            // a concurrent first request may create it in between; keep whichever row won
            carts::insert_for_user(&mut tx, &Cart::for_user(user_id)).await?;
            carts::find_for_user(&mut tx, user_id).await?.ok_or_else(|| AppError::not_found("Cart not found"))?
        }
    };

    let Some(guest_id) = cookie_cart.filter(|id| *id != cart.id()) else {
        tx.commit().await?;
        return Ok(ResolvedCart { cart, cookie: CookieUpdate::Keep });
    };

    // User cart first, then the guest one: the same order everywhere.
    cart = lock(&mut tx, cart.id()).await?;
    let mut merged = None;
    if let Some(guest) = carts::lock(&mut tx, guest_id).await?.filter(Cart::is_guest) {
        let mut ids = cart.product_ids();
        ids.extend(guest.product_ids());
        let catalog = products::find_many(&mut *tx, &ids).await?;
        cart.absorb(&guest, &catalog);
        carts::save(&mut tx, &cart).await?;
        carts::delete(&mut *tx, guest.id()).await?;
        merged = Some(guest.id());
    }
    tx.commit().await?;

    if let Some(guest_cart_id) = merged {
        tracing::info!(user_cart_id = %cart.id(), %guest_cart_id, "guest cart merged");
        state
            .events
            .publish(vec![DomainEvent::Cart(CartEvent::Merged { user_cart_id: cart.id(), guest_cart_id })])
            .await;
    }
    Ok(ResolvedCart { cart, cookie: CookieUpdate::Clear })
}

async fn resolve_for_guest(state: &AppState, cookie_cart: Option<Uuid>) -> AppResult<ResolvedCart> {
    if let Some(id) = cookie_cart {
        if let Some(cart) = carts::find_guest(&state.db, id).await? {
            return Ok(ResolvedCart { cart, cookie: CookieUpdate::Keep });
        }
    }
    let cart = Cart::new_guest();
    let mut conn = state.db.acquire().await?;
    carts::save(&mut conn, &cart).await?;
    Ok(ResolvedCart { cookie: CookieUpdate::Set(cart.id()), cart })
}

async fn lock(conn: &mut PgConnection, cart_id: Uuid) -> AppResult<Cart> {
    carts::lock(conn, cart_id).await?.ok_or_else(|| AppError::not_found("Cart not found"))
}

#[tracing::instrument(skip(state))]
pub async fn add_item(state: &AppState, cart_id: Uuid, product_id: Uuid, quantity: u32) -> AppResult<Cart> {
    let mut tx = state.db.begin().await?;
    let mut cart = lock(&mut tx, cart_id).await?;
    let product = products::find(&mut *tx, product_id).await?.ok_or_else(|| AppError::not_found("Product not found"))?;
    cart.add_item(&product, quantity)?;
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;
    Ok(cart)
}

/// Sets the absolute quantity of a product; zero removes the line.
#[tracing::instrument(skip(state))]
pub async fn update_quantity(state: &AppState, cart_id: Uuid, product_id: Uuid, quantity: u32) -> AppResult<Cart> {
    let mut tx = state.db.begin().await?;
    let mut cart = lock(&mut tx, cart_id).await?;
    let product = products::find(&mut *tx, product_id).await?.ok_or_else(|| AppError::not_found("Product not found"))?;
    cart.set_quantity(&product, quantity)?;
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;
    Ok(cart)
}

#[tracing::instrument(skip(state))]
pub async fn remove_item(state: &AppState, cart_id: Uuid, line_id: Uuid) -> AppResult<Cart> {
    let mut tx = state.db.begin().await?;
    let mut cart = lock(&mut tx, cart_id).await?;
    cart.remove_line(line_id)?;
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;
    Ok(cart)
}

#[tracing::instrument(skip(state))]
pub async fn clear(state: &AppState, cart_id: Uuid) -> AppResult<Cart> {
    let mut tx = state.db.begin().await?;
    let mut cart = lock(&mut tx, cart_id).await?;
    cart.clear();
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;
    Ok(cart)
}

/// Reconciles the cart with the live catalog and persists the result.
#[tracing::instrument(skip(state))]
pub async fn refresh(state: &AppState, cart_id: Uuid) -> AppResult<(Cart, Vec<CartChange>)> {
    let mut tx = state.db.begin().await?;
    let mut cart = lock(&mut tx, cart_id).await?;
    let catalog = products::find_many(&mut *tx, &cart.product_ids()).await?;
    let changes = cart.refresh(&catalog);
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;
    Ok((cart, changes))
}

/// Validates the cart for payment. The refreshed state is stored even when
/// validation fails, so the next read shows what needs attention.
#[tracing::instrument(skip(state))]
pub async fn prepare_checkout(state: &AppState, cart_id: Uuid) -> AppResult<OrderDraft> {
    let mut tx = state.db.begin().await?;
    let mut cart = lock(&mut tx, cart_id).await?;
    let catalog = products::find_many(&mut *tx, &cart.product_ids()).await?;
    let draft = cart.prepare_checkout(&catalog, &state.config.currency);
    carts::save(&mut tx, &cart).await?;
    tx.commit().await?;
    Ok(draft?)
}

pub async fn view(state: &AppState, cart: &Cart) -> AppResult<CartView> {
    let catalog = products::find_many(&state.db, &cart.product_ids()).await?;
    Ok(cart.view(&catalog, &state.config.currency))
}
