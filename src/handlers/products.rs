use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use super::FormData;
use crate::auth::AdminUser;
use crate::domain::aggregates::{NewProduct, Product, ProductPatch};
use crate::error::{AppError, AppResult};
use crate::repository::categories::{self, Category};
use crate::repository::products::{self, Facets, ProductFilter};
use crate::repository::reviews::{self, Comment};
use crate::services::products as service;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 12;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Builds the catalog filter from raw query pairs. List filters accept both
/// `brands=a,b` and repeated `brands=a&brands=b`.
pub fn parse_filter(pairs: &[(String, String)]) -> AppResult<ProductFilter> {
    fn number<T: std::str::FromStr>(key: &str, value: &str) -> AppResult<T> {
        value.trim().parse().map_err(|_| AppError::bad_request(format!("{key} must be a number")))
    }
    let mut filter = ProductFilter { page: 1, limit: DEFAULT_LIMIT, ..Default::default() };
    for (key, value) in pairs {
        let value = value.trim();
        if value.is_empty() { continue; }
        let list = || value.split(',').map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        match key.as_str() {
            "search" => filter.search = Some(value.to_string()),
            "brands" | "brand" => filter.brands.extend(list()),
            "models" | "model" => filter.models.extend(list()),
            "engines" | "engine" => filter.engines.extend(list()),
            "categoryId" | "category_id" => {
                filter.category_id = Some(Uuid::parse_str(value).map_err(|_| AppError::bad_request("categoryId must be a UUID"))?)
            }
            "inStock" | "in_stock" => filter.in_stock = match value {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => return Err(AppError::bad_request("inStock must be true or false")),
            },
            "yearMin" | "year_min" => filter.year_min = Some(number(key, value)?),
            "yearMax" | "year_max" => filter.year_max = Some(number(key, value)?),
            "priceMin" | "price_min" => filter.price_min = Some(number::<Decimal>(key, value)?),
            "priceMax" | "price_max" => filter.price_max = Some(number::<Decimal>(key, value)?),
            "page" => filter.page = number(key, value)?,
            "limit" => filter.limit = number(key, value)?,
            _ => {}
        }
    }
    if filter.page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    if !(1..=MAX_LIMIT).contains(&filter.limit) {
        return Err(AppError::bad_request(format!("limit must be between 1 and {MAX_LIMIT}")));
    }
    Ok(filter)
}

pub async fn list(State(s): State<AppState>, Query(pairs): Query<Vec<(String, String)>>) -> AppResult<Json<ProductPage>> {
    let filter = parse_filter(&pairs)?;
    let (items, total) = products::find_with_filters(&s.db, &filter).await?;
    Ok(Json(ProductPage { items, total, page: filter.page, limit: filter.limit }))
}

pub async fn facets(State(s): State<AppState>) -> AppResult<Json<Facets>> {
    Ok(Json(products::facets(&s.db).await?))
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub comments: Vec<Comment>,
}

pub async fn get(State(s): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<ProductDetail>> {
    let product = products::find(&s.db, id).await?.ok_or_else(|| AppError::not_found("Product not found"))?;
    let category = match product.category_id {
        Some(category_id) => categories::find(&s.db, category_id).await?,
        None => None,
    };
    let comments = reviews::comments_for_product(&s.db, id).await?;
    Ok(Json(ProductDetail { product, category, comments }))
}

pub async fn get_by_name(State(s): State<AppState>, Path(name): Path<String>) -> AppResult<Json<Product>> {
    products::find_by_name(&s.db, &name).await?.map(Json).ok_or_else(|| AppError::not_found("Product not found"))
}

#[derive(Debug, Validate)]
struct ProductForm {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    name: String,
    #[validate(length(min = 1, max = 50))]
    brand: String,
    #[validate(length(min = 1, max = 50))]
    model: String,
    #[validate(length(min = 1, max = 50))]
    engine: String,
    #[validate(range(min = 1900, max = 2100))]
    year: Option<i32>,
}

/// `multipart/form-data` with the product fields and an optional `file` image.
pub async fn create(State(s): State<AppState>, AdminUser(_): AdminUser, multipart: Multipart) -> AppResult<(StatusCode, Json<Product>)> {
    let form = FormData::read(multipart).await?;
    let fields = ProductForm {
        name: form.text("name").trim().to_string(),
        brand: form.text("brand").trim().to_string(),
        model: form.text("model").trim().to_string(),
        engine: form.text("engine").trim().to_string(),
        year: form.parsed("year")?,
    };
    fields.validate()?;
    let price: Decimal = form.parsed("price")?.ok_or_else(|| AppError::bad_request("price is required"))?;
    let stock: u32 = form.parsed("stock")?.unwrap_or(0);
    let category_id: Uuid = form.parsed("categoryId")?.ok_or_else(|| AppError::bad_request("categoryId is required"))?;
    if categories::find(&s.db, category_id).await?.is_none() {
        return Err(AppError::not_found("Category not found"));
    }

    let description = form.optional("description");
    let linked_image = form.optional("imgUrl");
    let img_url = match form.file {
        Some(image) => {
            image.validate()?;
            Some(s.images.upload(image).await?)
        }
        None => linked_image,
    };

    let product = Product::create(NewProduct {
        name: fields.name,
        description,
        price,
        stock,
        img_url,
        year: fields.year,
        brand: fields.brand,
        model: fields.model,
        engine: fields.engine,
        category_id,
    })?;
    let product = products::insert(&s.db, &product).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProductPatch>,
) -> AppResult<Json<Product>> {
    Ok(Json(service::update(&s, id, patch).await?))
}

pub async fn remove(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if products::delete(&s.db, id).await? == 0 {
        return Err(AppError::not_found("Product not found"));
    }
    tracing::info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the product image with the uploaded `file`.
pub async fn upload_image(
    State(s): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<Product>> {
    if products::find(&s.db, id).await?.is_none() {
        return Err(AppError::not_found("Product not found"));
    }
    let form = FormData::read(multipart).await?;
    let image = form.file.ok_or_else(|| AppError::bad_request("file is required"))?;
    image.validate()?;
    let url = s.images.upload(image).await?;
    products::set_img_url(&s.db, id, &url).await?.map(Json).ok_or_else(|| AppError::not_found("Product not found"))
}
