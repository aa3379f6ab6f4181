//! Product comments and favorites.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, CurrentUser};
use crate::domain::aggregates::Product;
use crate::error::{AppError, AppResult};
use crate::repository::products;
use crate::repository::reviews::{self, Comment, FavoriteEntry};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 500, message = "content must be 1 to 500 characters"))]
    pub content: String,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i16,
}

/// One comment per user and product; the product rating is refreshed in the
/// same transaction.
pub async fn create_comment(
    State(s): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(r): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    if products::find(&mut *tx, r.product_id).await?.is_none() {
        return Err(AppError::not_found("Product not found"));
    }
    let comment = match reviews::insert_comment(&mut tx, r.product_id, caller.user_id(), r.content.trim(), r.rating).await {
        Ok(comment) => comment,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(AppError::conflict("You already reviewed this product"));
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn product_comments(State(s): State<AppState>, Path(product_id): Path<Uuid>) -> AppResult<Json<Vec<Comment>>> {
    Ok(Json(reviews::comments_for_product(&s.db, product_id).await?))
}

pub async fn add_favorite(
    State(s): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if products::find(&s.db, product_id).await?.is_none() {
        return Err(AppError::not_found("Product not found"));
    }
    reviews::add_favorite(&s.db, caller.user_id(), product_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn remove_favorite(
    State(s): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if reviews::remove_favorite(&s.db, caller.user_id(), product_id).await? == 0 {
        return Err(AppError::not_found("Favorite not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_favorites(State(s): State<AppState>, CurrentUser(caller): CurrentUser) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(reviews::favorites_for_user(&s.db, caller.user_id()).await?))
}

pub async fn all_favorites(State(s): State<AppState>, AdminUser(_): AdminUser) -> AppResult<Json<Vec<FavoriteEntry>>> {
    Ok(Json(reviews::all_favorites(&s.db).await?))
}
