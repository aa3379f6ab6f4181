//! HTTP handlers, one module per resource.

pub mod auth;
pub mod cart;
pub mod categories;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod users;

use std::collections::HashMap;

use axum::extract::Multipart;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::media::ImageUpload;

#[derive(Debug, Deserialize, Validate)]
pub struct PageParams {
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn resolve(&self, default_limit: u32) -> AppResult<(u32, u32)> {
        self.validate()?;
        Ok((self.page.unwrap_or(1), self.limit.unwrap_or(default_limit)))
    }
}

/// Text fields and the optional `file` part of a multipart form.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub file: Option<ImageUpload>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let bad = |e: axum::extract::multipart::MultipartError| AppError::bad_request(format!("Invalid multipart body: {e}"));
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                let data = field.bytes().await.map_err(bad)?.to_vec();
                if !data.is_empty() {
                    form.file = Some(ImageUpload { filename, content_type, data });
                }
            } else {
                form.fields.insert(name, field.text().await.map_err(bad)?);
            }
        }
        Ok(form)
    }

    pub fn text(&self, key: &str) -> String {
        self.fields.get(key).cloned().unwrap_or_default()
    }

    pub fn optional(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// Parses an optional field, reporting the key on failure.
    pub fn parsed<T: std::str::FromStr>(&self, key: &str) -> AppResult<Option<T>> {
        self.optional(key)
            .map(|v| v.parse::<T>().map_err(|_| AppError::bad_request(format!("{key} is not valid"))))
            .transpose()
    }
}
