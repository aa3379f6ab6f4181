//! Cart endpoints. Guests are tracked with the `cart_id` cookie; signed-in
//! callers use their own cart and any guest cart still in the cookie is
//! merged into it.

use axum::{
    extract::{Path, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::MaybeUser;
use crate::domain::aggregates::{CartChange, CartView, OrderDraft};
use crate::error::{AppError, AppResult};
use crate::services::cart::{self as service, CookieUpdate, ResolvedCart};
use crate::state::AppState;

pub const CART_COOKIE: &str = "cart_id";
const CART_COOKIE_MAX_AGE: u32 = 30 * 24 * 60 * 60;

/// Reads the `cart_id` cookie; malformed values are treated as absent.
pub fn cart_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CART_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn set_cookie_header(update: CookieUpdate) -> Option<HeaderValue> {
    let value = match update {
        CookieUpdate::Keep => return None,
        CookieUpdate::Set(id) => format!("{CART_COOKIE}={id}; Path=/; Max-Age={CART_COOKIE_MAX_AGE}; HttpOnly; SameSite=Lax"),
        CookieUpdate::Clear => format!("{CART_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"),
    };
    HeaderValue::from_str(&value).ok()
}

fn with_cookie(update: CookieUpdate, body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    if let Some(value) = set_cookie_header(update) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

async fn resolve(s: &AppState, user: &MaybeUser, headers: &HeaderMap) -> AppResult<ResolvedCart> {
    service::resolve(s, user.0.as_ref().map(|c| c.user_id()), cart_cookie(headers)).await
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: CartView,
    pub changes: Vec<CartChange>,
}

/// Current cart, reconciled against the live catalog.
pub async fn get(State(s): State<AppState>, user: MaybeUser, headers: HeaderMap) -> AppResult<Response> {
    let ResolvedCart { cart, cookie } = resolve(&s, &user, &headers).await?;
    let (cart, changes) = service::refresh(&s, cart.id()).await?;
    let view = service::view(&s, &cart).await?;
    Ok(with_cookie(cookie, Json(CartResponse { cart: view, changes })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

pub async fn add_item(
    State(s): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    Json(r): Json<AddItemRequest>,
) -> AppResult<Response> {
    r.validate()?;
    let ResolvedCart { cart, cookie } = resolve(&s, &user, &headers).await?;
    let cart = service::add_item(&s, cart.id(), r.product_id, r.quantity).await?;
    let view = service::view(&s, &cart).await?;
    Ok(with_cookie(cookie, (StatusCode::CREATED, Json(view))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

/// `PATCH /cart/items/:id` addresses the line by product id; zero removes it.
pub async fn update_quantity(
    State(s): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
    Json(r): Json<UpdateQuantityRequest>,
) -> AppResult<Response> {
    let ResolvedCart { cart, cookie } = resolve(&s, &user, &headers).await?;
    let cart = service::update_quantity(&s, cart.id(), product_id, r.quantity).await?;
    let view = service::view(&s, &cart).await?;
    Ok(with_cookie(cookie, Json(view)))
}

/// `DELETE /cart/items/:id` addresses the line by its own id.
pub async fn remove_item(
    State(s): State<AppState>,
    user: MaybeUser,
    headers: HeaderMap,
    Path(line_id): Path<Uuid>,
) -> AppResult<Response> {
    let ResolvedCart { cart, cookie } = resolve(&s, &user, &headers).await?;
    service::remove_item(&s, cart.id(), line_id).await?;
    Ok(with_cookie(cookie, StatusCode::NO_CONTENT))
}

pub async fn clear(State(s): State<AppState>, user: MaybeUser, headers: HeaderMap) -> AppResult<Response> {
    let ResolvedCart { cart, cookie } = resolve(&s, &user, &headers).await?;
    service::clear(&s, cart.id()).await?;
    Ok(with_cookie(cookie, StatusCode::NO_CONTENT))
}

/// Validates the cart and returns the preliminary order; 409 with the list of
/// changes when something moved.
pub async fn checkout(State(s): State<AppState>, user: MaybeUser, headers: HeaderMap) -> AppResult<Response> {
    if user.0.is_none() {
        return Err(AppError::unauthorized("Sign in to check out"));
    }
    let ResolvedCart { cart, cookie } = resolve(&s, &user, &headers).await?;
    let draft: OrderDraft = service::prepare_checkout(&s, cart.id()).await?;
    Ok(with_cookie(cookie, Json(draft)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_cookie_parsing() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("theme=dark; cart_id={id}; other=1")).unwrap());
        assert_eq!(cart_cookie(&headers), Some(id));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("cart_id=not-a-uuid"));
        assert_eq!(cart_cookie(&headers), None);
        assert_eq!(cart_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn test_set_cookie_header() {
        let id = Uuid::nil();
        let set = set_cookie_header(CookieUpdate::Set(id)).unwrap();
        let set = set.to_str().unwrap();
        assert!(set.starts_with(&format!("cart_id={id};")));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("SameSite=Lax"));
        assert!(set.contains("Max-Age=2592000"));

        let cleared = set_cookie_header(CookieUpdate::Clear).unwrap();
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
        assert!(set_cookie_header(CookieUpdate::Keep).is_none());
    }
}
