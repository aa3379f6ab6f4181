//! HTTP-facing error type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::aggregates::{CartError, OrderError, ProductError, UserError};
use crate::media::MediaError;
use crate::notifications::MailError;
use crate::payments::PaymentError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict { message: String, details: Option<Value> },
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self { Self::BadRequest(message.into()) }
    pub fn not_found(message: impl Into<String>) -> Self { Self::NotFound(message.into()) }
    pub fn forbidden(message: impl Into<String>) -> Self { Self::Forbidden(message.into()) }
    pub fn unauthorized(message: impl Into<String>) -> Self { Self::Unauthorized(message.into()) }
    pub fn conflict(message: impl Into<String>) -> Self { Self::Conflict { message: message.into(), details: None } }

    fn parts(&self) -> (StatusCode, String, Option<Value>) {
        match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone(), None),
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, "Validation failed".into(), Some(validation_details(errors))),
            Self::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone(), None),
            Self::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone(), None),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m.clone(), None),
            Self::Conflict { message, details } => (StatusCode::CONFLICT, message.clone(), details.clone()),
            Self::Upstream(m) => (StatusCode::BAD_GATEWAY, m.clone(), None),
            Self::Database(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "Resource not found".into(), None),
            Self::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                (StatusCode::CONFLICT, "Resource already exists".into(), None)
            }
            Self::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                (StatusCode::CONFLICT, "Resource is still referenced".into(), None)
            }
            Self::Database(_) | Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into(), None),
        }
    }
}

fn validation_details(errors: &validator::ValidationErrors) -> Value {
    let fields: serde_json::Map<String, Value> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages: Vec<String> = errs
                .iter()
                .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()))
                .collect();
            (field.to_string(), json!(messages))
        })
        .collect();
    Value::Object(fields)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let mut body = json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
        });
        if let Some(details) = details {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity => Self::BadRequest(err.to_string()),
            CartError::InsufficientStock { product_id, available } => Self::Conflict {
                message: "Insufficient stock".into(),
                details: Some(json!({ "code": "INSUFFICIENT_STOCK", "productId": product_id, "available": available })),
            },
            CartError::ItemNotFound => Self::NotFound(err.to_string()),
            CartError::Empty => Self::Conflict { message: err.to_string(), details: Some(json!({ "changes": [] })) },
            CartError::NeedsAttention { changes } => Self::Conflict {
                message: "Cart needs attention".into(),
                details: Some(json!({ "changes": changes })),
            },
            CartError::UnknownStatus(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::ProductMissing(id) => Self::NotFound(format!("Product {id} not found")),
            OrderError::Stock(ProductError::InsufficientStock { product_id, .. }) => {
                Self::BadRequest(format!("Product {product_id} is out of stock"))
            }
            OrderError::UnknownStatus(_) => Self::Internal(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::InsufficientStock { product_id, available, .. } => Self::Conflict {
                message: "Insufficient stock".into(),
                details: Some(json!({ "code": "INSUFFICIENT_STOCK", "productId": product_id, "available": available })),
            },
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::SuperAdminProtected => Self::Forbidden(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured => Self::BadRequest(err.to_string()),
            _ => Self::Upstream(err.to_string()),
        }
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self { Self::Upstream(err.to_string()) }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::TooLarge { .. } | MediaError::UnsupportedType(_) => Self::BadRequest(err.to_string()),
            MediaError::NotConfigured => Self::BadRequest(err.to_string()),
            _ => Self::Upstream(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let (status, body) = body_of(AppError::not_found("Product not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["message"], "Product not found");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_cart_needs_attention_carries_changes() {
        let change = crate::domain::aggregates::CartChange::ProductUnavailable { item_id: Uuid::nil(), product_id: Uuid::nil() };
        let (status, body) = body_of(CartError::NeedsAttention { changes: vec![change] }.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Cart needs attention");
        assert_eq!(body["details"]["changes"][0]["type"], "PRODUCT_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_conflict() {
        let (status, body) = body_of(CartError::InsufficientStock { product_id: Uuid::nil(), available: 2 }.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["details"]["available"], 2);
    }

    #[tokio::test]
    async fn test_internal_errors_are_masked() {
        let (status, body) = body_of(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        let (status, _) = body_of(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
