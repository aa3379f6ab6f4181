//! Mercado Pago checkout, redirects and notifications.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::aggregates::Order;
use crate::error::{AppError, AppResult};
use crate::payments::webhook::parse_notification;
use crate::services::checkout::{self, CheckoutPreference};
use crate::state::AppState;

pub async fn create_checkout(
    State(s): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(cart_id): Path<Uuid>,
) -> AppResult<Json<CheckoutPreference>> {
    Ok(Json(checkout::create_preference(&s, cart_id, caller.user_id()).await?))
}

/// Always answers 200 once an id is present; processing failures are
/// logged so the provider does not keep retrying.
pub async fn webhook(State(s): State<AppState>, Query(query): Query<HashMap<String, String>>) -> AppResult<Json<Value>> {
    let notification = parse_notification(&query).ok_or_else(|| AppError::bad_request("Missing notification id"))?;
    checkout::handle_notification(&s, notification).await;
    Ok(Json(json!({ "received": true })))
}

pub async fn success() -> Json<Value> {
    Json(json!({ "status": "success", "message": "Payment approved" }))
}

pub async fn failure() -> Json<Value> {
    Json(json!({ "status": "failure", "message": "Payment failed" }))
}

pub async fn pending() -> Json<Value> {
    Json(json!({ "status": "pending", "message": "Payment pending" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub status: String,
    #[serde(alias = "payment_id")]
    pub payment_id: Option<String>,
    #[serde(alias = "preference_id")]
    pub preference_id: String,
}

pub async fn confirm(State(s): State<AppState>, Json(r): Json<ConfirmRequest>) -> AppResult<Json<Order>> {
    if r.status.trim().is_empty() || r.preference_id.trim().is_empty() {
        return Err(AppError::bad_request("status and preferenceId are required"));
    }
    let order = checkout::confirm_payment(&s, r.status.trim(), r.payment_id, r.preference_id.trim()).await?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_request_accepts_both_spellings() {
        let camel: ConfirmRequest =
            serde_json::from_str(r#"{"status":"approved","paymentId":"123","preferenceId":"pref-1"}"#).unwrap();
        assert_eq!(camel.payment_id.as_deref(), Some("123"));
        assert_eq!(camel.preference_id, "pref-1");

        let snake: ConfirmRequest = serde_json::from_str(r#"{"status":"approved","preference_id":"pref-2"}"#).unwrap();
        assert_eq!(snake.payment_id, None);
        assert_eq!(snake.preference_id, "pref-2");
    }
}
