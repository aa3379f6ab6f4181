use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::FormData;
use crate::auth::{google, CurrentUser};
use crate::domain::aggregates::User;
use crate::error::{AppError, AppResult};
use crate::services::auth::{self as service, Credentials, NewAccount, Session};
use crate::state::AppState;

pub async fn index() -> Json<serde_json::Value> {
    Json(json!({ "message": "GET /auth" }))
}

/// `multipart/form-data` with the account fields and an optional `file` avatar.
pub async fn register(State(s): State<AppState>, multipart: Multipart) -> AppResult<(StatusCode, Json<User>)> {
    let form = FormData::read(multipart).await?;
    let account = NewAccount {
        email: form.text("email"),
        name: form.text("name"),
        password: form.text("password"),
        confirm_password: form.text("confirmPassword"),
        address: form.text("address"),
        phone: form.text("phone"),
        country: form.text("country"),
        city: form.text("city"),
    };
    let user = service::register(&s, account, form.file).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn sign_in(State(s): State<AppState>, Json(credentials): Json<Credentials>) -> AppResult<Json<Session>> {
    Ok(Json(service::sign_in(&s, credentials).await?))
}

/// Tokens are stateless; the client just forgets it.
pub async fn logout(CurrentUser(_): CurrentUser) -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn verify(State(s): State<AppState>, Path(token): Path<String>) -> AppResult<Json<serde_json::Value>> {
    service::verify_account(&s, &token).await?;
    Ok(Json(json!({ "success": true, "message": "Cuenta verificada" })))
}

pub async fn google_start(State(s): State<AppState>) -> AppResult<Redirect> {
    let config = s.config.google.as_ref().ok_or_else(|| AppError::bad_request("Google sign-in is not configured"))?;
    Ok(Redirect::to(&google::authorize_url(config, &Uuid::new_v4().to_string())))
}

pub async fn google_callback(State(s): State<AppState>, Query(q): Query<HashMap<String, String>>) -> AppResult<impl IntoResponse> {
    let config = s.config.google.as_ref().ok_or_else(|| AppError::bad_request("Google sign-in is not configured"))?;
    if let Some(error) = q.get("error") {
        return Err(AppError::unauthorized(format!("Google sign-in cancelled: {error}")));
    }
    let code = q.get("code").filter(|c| !c.is_empty()).ok_or_else(|| AppError::bad_request("Missing authorization code"))?;
    let profile = google::fetch_profile(&s.http, config, code).await?;
    let session = service::google_login(&s, profile).await?;
    Ok(Redirect::to(&service::frontend_redirect(&s.config.frontend_url, &session)?))
}
