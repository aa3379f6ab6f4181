//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Quantity;

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub img_url: Option<String>,
    pub year: Option<i32>,
    pub brand: String,
    pub model: String,
    pub engine: String,
    pub category_id: Option<Uuid>,
    pub average_rating: Decimal,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a product.
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: u32,
    pub img_url: Option<String>,
    pub year: Option<i32>,
    pub brand: String,
    pub model: String,
    pub engine: String,
    pub category_id: Uuid,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub img_url: Option<String>,
    pub year: Option<i32>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub engine: Option<String>,
    pub category_id: Option<Uuid>,
}

impl Product {
    pub fn create(new: NewProduct) -> Result<Self, ProductError> {
        if new.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if new.price.is_sign_negative() { return Err(ProductError::NegativePrice); }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            name: new.name.trim().to_string(),
            description: new.description,
            price: new.price.round_dp(2),
            stock: i32::try_from(new.stock).map_err(|_| ProductError::StockOverflow)?,
            img_url: new.img_url,
            year: new.year,
            brand: new.brand,
            model: new.model,
            engine: new.engine,
            category_id: Some(new.category_id),
            average_rating: Decimal::ZERO,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Units that can still be sold; negative stock is treated as none.
    pub fn available(&self) -> Quantity { Quantity::new(u32::try_from(self.stock).unwrap_or(0)) }

    pub fn can_fulfil(&self, qty: u32) -> bool { self.available().value() >= qty }

    pub fn add_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        let next = self.available().add(qty).value();
        self.stock = i32::try_from(next).map_err(|_| ProductError::StockOverflow)?;
        self.touch();
        Ok(())
    }

    pub fn set_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = i32::try_from(qty).map_err(|_| ProductError::StockOverflow)?;
        self.touch();
        Ok(())
    }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        let left = self.available().subtract(qty).ok_or(ProductError::InsufficientStock {
            product_id: self.id,
            requested: qty,
            available: self.available().value(),
        })?;
        self.stock = i32::try_from(left.value()).map_err(|_| ProductError::StockOverflow)?;
        self.touch();
        Ok(())
    }

    pub fn apply(&mut self, patch: ProductPatch) -> Result<(), ProductError> {
        if let Some(name) = patch.name {
            if name.trim().is_empty() { return Err(ProductError::MissingName); }
            self.name = name.trim().to_string();
        }
        if let Some(price) = patch.price {
            if price.is_sign_negative() { return Err(ProductError::NegativePrice); }
            self.price = price.round_dp(2);
        }
        if let Some(stock) = patch.stock { self.set_stock(stock)?; }
        if patch.description.is_some() { self.description = patch.description; }
        if patch.img_url.is_some() { self.img_url = patch.img_url; }
        if patch.year.is_some() { self.year = patch.year; }
        if let Some(brand) = patch.brand { self.brand = brand; }
        if let Some(model) = patch.model { self.model = model; }
        if let Some(engine) = patch.engine { self.engine = engine; }
        if patch.category_id.is_some() { self.category_id = patch.category_id; }
        self.touch();
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Average of the given 1..=5 ratings, two decimals; zero when there are none.
pub fn average_rating(ratings: &[i16]) -> Decimal {
    if ratings.is_empty() { return Decimal::ZERO; }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    (Decimal::from(sum) / Decimal::from(ratings.len() as i64)).round_dp(2)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Product name is required")]
    MissingName,
    #[error("Price cannot be negative")]
    NegativePrice,
    #[error("Stock value out of range")]
    StockOverflow,
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(name: &str, price: Decimal, stock: u32) -> Product {
        Product::create(NewProduct {
            name: name.into(),
            description: None,
            price,
            stock,
            img_url: Some(format!("https://img.test/{name}.png")),
            year: Some(2020),
            brand: "Bosch".into(),
            model: "Onix".into(),
            engine: "1.4".into(),
            category_id: Uuid::nil(),
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::product;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_create() {
        let p = product("Filtro de Aceite", dec!(29.99), 10);
        assert_eq!(p.name, "Filtro de Aceite");
        assert_eq!(p.available().value(), 10);
    }

    #[test]
    fn test_create_rejects_blank_name_and_negative_price() {
        let base = product("x", dec!(1), 1);
        let mut new = NewProduct {
            name: "  ".into(), description: None, price: dec!(1), stock: 1, img_url: None,
            year: None, brand: base.brand.clone(), model: base.model.clone(), engine: base.engine.clone(),
            category_id: Uuid::nil(),
        };
        assert_eq!(Product::create(new.clone()).unwrap_err(), ProductError::MissingName);
        new.name = "ok".into();
        new.price = dec!(-1);
        assert_eq!(Product::create(new).unwrap_err(), ProductError::NegativePrice);
    }

    #[test]
    fn test_stock() {
        let mut p = product("Pastillas", dec!(10), 5);
        p.remove_stock(3).unwrap();
        assert_eq!(p.stock, 2);
        let err = p.remove_stock(3).unwrap_err();
        assert!(matches!(err, ProductError::InsufficientStock { requested: 3, available: 2, .. }));
        p.add_stock(8).unwrap();
        assert_eq!(p.stock, 10);
        assert!(p.can_fulfil(10));
        assert!(!p.can_fulfil(11));
    }

    #[test]
    fn test_apply_patch() {
        let mut p = product("Bujia", dec!(5), 1);
        p.apply(ProductPatch { price: Some(dec!(7.499)), stock: Some(4), ..Default::default() }).unwrap();
        assert_eq!(p.price, dec!(7.50));
        assert_eq!(p.stock, 4);
        assert_eq!(p.name, "Bujia");
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), Decimal::ZERO);
        assert_eq!(average_rating(&[5, 4, 4]), dec!(4.33));
    }
}
