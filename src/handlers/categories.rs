use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::{AppError, AppResult};
use crate::repository::categories::{self, Category};
use crate::state::AppState;

pub async fn list(State(s): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(categories::list(&s.db).await?))
}

pub async fn get(State(s): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Category>> {
    categories::find(&s.db, id).await?.map(Json).ok_or_else(|| AppError::not_found("Category not found"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: String,
}

pub async fn create(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Json(r): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    r.validate()?;
    let category = categories::insert(&s.db, &r.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}
