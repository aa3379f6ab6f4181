use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::PageParams;
use crate::auth::{AdminUser, Claims, CurrentUser};
use crate::domain::aggregates::{Order, User};
use crate::error::{AppError, AppResult};
use crate::repository::{orders, users};
use crate::services::{PageMeta, Paginated};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

pub async fn list(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Query(p): Query<UserListParams>,
) -> AppResult<Json<Paginated<User>>> {
    let (page, limit) = PageParams { page: p.page, limit: p.limit }.resolve(10)?;
    let search = p.search.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let (data, total) = users::list(&s.db, page, limit, search).await?;
    Ok(Json(Paginated { data, meta: PageMeta::new(total, page, limit) }))
}

#[derive(Debug, Serialize)]
pub struct UserWithOrders {
    #[serde(flatten)]
    pub user: User,
    pub orders: Vec<Order>,
}

fn ensure_self_or_admin(caller: &Claims, id: Uuid) -> AppResult<()> {
    if caller.user_id() != id && !caller.is_admin {
        return Err(AppError::forbidden("You can only access your own account"));
    }
    Ok(())
}

pub async fn get(State(s): State<AppState>, CurrentUser(caller): CurrentUser, Path(id): Path<Uuid>) -> AppResult<Json<UserWithOrders>> {
    ensure_self_or_admin(&caller, id)?;
    let user = users::find(&s.db, id).await?.ok_or_else(|| AppError::not_found("User not found"))?;
    let orders = orders::list_for_user(&s.db, id).await?;
    Ok(Json(UserWithOrders { user, orders }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 80))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub phone: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub country: Option<String>,
    #[validate(length(min = 5, max = 80))]
    pub address: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub city: Option<String>,
    #[validate(url)]
    pub img_url: Option<String>,
    pub is_admin: Option<bool>,
}

pub async fn update(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    r.validate()?;
    let mut user = users::find(&s.db, id).await?.ok_or_else(|| AppError::not_found("User not found"))?;
    if let Some(name) = r.name { user.name = name.trim().to_string(); }
    if r.phone.is_some() { user.phone = r.phone; }
    if r.country.is_some() { user.country = r.country; }
    if r.address.is_some() { user.address = r.address; }
    if r.city.is_some() { user.city = r.city; }
    if r.img_url.is_some() { user.img_url = r.img_url; }
    if let Some(is_admin) = r.is_admin {
        if is_admin != user.is_admin { user.toggle_admin()?; }
    }
    Ok(Json(users::save(&s.db, &user).await?))
}

pub async fn delete(State(s): State<AppState>, CurrentUser(caller): CurrentUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    ensure_self_or_admin(&caller, id)?;
    if users::delete(&s.db, id).await? == 0 {
        return Err(AppError::not_found("User not found"));
    }
    tracing::info!(user_id = %id, deleted_by = %caller.user_id(), "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_ban(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<User>> {
    let mut user = users::find(&s.db, id).await?.ok_or_else(|| AppError::not_found("User not found"))?;
    user.toggle_ban()?;
    Ok(Json(users::save(&s.db, &user).await?))
}

pub async fn toggle_admin(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<User>> {
    let mut user = users::find(&s.db, id).await?.ok_or_else(|| AppError::not_found("User not found"))?;
    user.toggle_admin()?;
    Ok(Json(users::save(&s.db, &user).await?))
}
