//! Cart Aggregate
//!
//! A cart is either owned by a signed-in user or anonymous (guest, tracked by
//! cookie). Lines keep the price seen when the item was added next to the
//! live price last observed, so the buyer can be told when a price moved.
//! Every mutation re-checks the requested quantity against live stock; the
//! checkout draft is only produced from a cart that reconciled cleanly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::product::Product;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Active,
    /// A payment preference was issued; waiting for the provider.
    Pending,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::Pending => "pending" }
    }

    pub fn parse(value: &str) -> Result<Self, CartError> {
        match value {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            other => Err(CartError::UnknownStatus(other.to_string())),
        }
    }
}

/// Row shape of the `carts` table.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CartRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: String,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub mp_preference_id: Option<String>,
    pub mp_payment_id: Option<String>,
    pub needs_attention: bool,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_at_add: Decimal,
    pub unit_price_current: Decimal,
    pub product_name_snapshot: String,
    pub image_url_snapshot: Option<String>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    fn new(product: &Product, quantity: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            product_id: product.id,
            quantity: clamp_i32(quantity),
            unit_price_at_add: product.price,
            unit_price_current: product.price,
            product_name_snapshot: product.name.clone(),
            image_url_snapshot: product.img_url.clone(),
            is_valid: true,
            created_at: Utc::now(),
        }
    }

    pub fn quantity(&self) -> u32 { u32::try_from(self.quantity).unwrap_or(0) }

    pub fn line_total(&self) -> Decimal { self.unit_price_current * Decimal::from(self.quantity()) }

    pub fn price_changed(&self) -> bool { self.unit_price_at_add != self.unit_price_current }
}

/// Something reconciliation found out of date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartChange {
    #[serde(rename_all = "camelCase")]
    PriceChanged { item_id: Uuid, old: Decimal, new: Decimal },
    #[serde(rename_all = "camelCase")]
    StockReduced { item_id: Uuid, requested: u32, available: u32 },
    #[serde(rename_all = "camelCase")]
    ProductUnavailable { item_id: Uuid, product_id: Uuid },
}

#[derive(Clone, Debug)]
pub struct Cart {
    id: Uuid,
    user_id: Option<Uuid>,
    status: CartStatus,
    lines: Vec<CartLine>,
    subtotal: Decimal,
    total: Decimal,
    mp_preference_id: Option<String>,
    mp_payment_id: Option<String>,
    needs_attention: bool,
    last_validated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new_guest() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), user_id: None, status: CartStatus::Active, lines: vec![],
            subtotal: Decimal::ZERO, total: Decimal::ZERO, mp_preference_id: None, mp_payment_id: None,
            needs_attention: false, last_validated_at: None, created_at: now, updated_at: now,
        }
    }

    pub fn for_user(user_id: Uuid) -> Self {
        let mut cart = Self::new_guest();
        cart.user_id = Some(user_id);
        cart
    }

    pub fn from_record(record: CartRecord, lines: Vec<CartLine>) -> Result<Self, CartError> {
        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            status: CartStatus::parse(&record.status)?,
            lines,
            subtotal: record.subtotal,
            total: record.total,
            mp_preference_id: record.mp_preference_id,
            mp_payment_id: record.mp_payment_id,
            needs_attention: record.needs_attention,
            last_validated_at: record.last_validated_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub fn record(&self) -> CartRecord {
        CartRecord {
            id: self.id,
            user_id: self.user_id,
            status: self.status.as_str().to_string(),
            subtotal: self.subtotal,
            total: self.total,
            mp_preference_id: self.mp_preference_id.clone(),
            mp_payment_id: self.mp_payment_id.clone(),
            needs_attention: self.needs_attention,
            last_validated_at: self.last_validated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Option<Uuid> { self.user_id }
    pub fn status(&self) -> CartStatus { self.status }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn subtotal(&self) -> Decimal { self.subtotal }
    pub fn total(&self) -> Decimal { self.total }
    pub fn preference_id(&self) -> Option<&str> { self.mp_preference_id.as_deref() }
    pub fn payment_id(&self) -> Option<&str> { self.mp_payment_id.as_deref() }
    pub fn needs_attention(&self) -> bool { self.needs_attention }
    pub fn last_validated_at(&self) -> Option<DateTime<Utc>> { self.last_validated_at }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn is_guest(&self) -> bool { self.user_id.is_none() }
    pub fn belongs_to(&self, user_id: Uuid) -> bool { self.user_id == Some(user_id) }
    pub fn product_ids(&self) -> Vec<Uuid> { self.lines.iter().map(|l| l.product_id).collect() }

    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let existing = self.lines.iter().position(|l| l.product_id == product.id);
        let requested = existing.map_or(0, |i| self.lines[i].quantity()).saturating_add(quantity);
        if !product.can_fulfil(requested) {
            return Err(CartError::InsufficientStock { product_id: product.id, available: product.available().value() });
        }
        self.ensure_editable();
        match existing {
            Some(i) => {
                let line = &mut self.lines[i];
                line.quantity = clamp_i32(requested);
                line.unit_price_current = product.price;
                line.is_valid = true;
            }
            None => self.lines.push(CartLine::new(product, quantity)),
        }
        self.recalculate();
        Ok(())
    }

    /// Absolute quantity for a product already in the cart; zero removes the line.
    pub fn set_quantity(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        let index = self.lines.iter().position(|l| l.product_id == product.id).ok_or(CartError::ItemNotFound)?;
        if quantity > 0 && !product.can_fulfil(quantity) {
            return Err(CartError::InsufficientStock { product_id: product.id, available: product.available().value() });
        }
        self.ensure_editable();
        if quantity == 0 {
            self.lines.remove(index);
        } else {
            let line = &mut self.lines[index];
            line.quantity = clamp_i32(quantity);
            line.unit_price_current = product.price;
            line.is_valid = true;
        }
        self.recalculate();
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> Result<CartLine, CartError> {
        let index = self.lines.iter().position(|l| l.id == line_id).ok_or(CartError::ItemNotFound)?;
        self.ensure_editable();
        let line = self.lines.remove(index);
        self.recalculate();
        Ok(line)
    }

    pub fn clear(&mut self) {
        self.ensure_editable();
        self.lines.clear();
        self.recalculate();
    }

    /// Reconciles every line against the live catalog and reports what moved.
    pub fn refresh(&mut self, catalog: &HashMap<Uuid, Product>) -> Vec<CartChange> {
        let mut changes = Vec::new();
        for line in &mut self.lines {
            let Some(product) = catalog.get(&line.product_id) else {
                changes.push(CartChange::ProductUnavailable { item_id: line.id, product_id: line.product_id });
                line.is_valid = false;
                continue;
            };
            if line.unit_price_current != product.price {
                changes.push(CartChange::PriceChanged { item_id: line.id, old: line.unit_price_current, new: product.price });
                line.unit_price_current = product.price;
            }
            if product.can_fulfil(line.quantity()) {
                line.is_valid = true;
            } else {
                changes.push(CartChange::StockReduced {
                    item_id: line.id,
                    requested: line.quantity(),
                    available: product.available().value(),
                });
                line.is_valid = false;
            }
        }
        self.needs_attention = self.lines.iter().any(|l| !l.is_valid);
        self.last_validated_at = Some(Utc::now());
        self.recalculate();
        changes
    }

    /// Refreshes and, if nothing needs the buyer's attention, returns the order draft.
    pub fn prepare_checkout(&mut self, catalog: &HashMap<Uuid, Product>, currency: &str) -> Result<OrderDraft, CartError> {
        let changes = self.refresh(catalog);
        if self.lines.is_empty() { return Err(CartError::Empty); }
        if !changes.is_empty() || self.lines.iter().any(|l| !l.is_valid) {
            return Err(CartError::NeedsAttention { changes });
        }
        Ok(OrderDraft {
            order_id: None,
            status: "pending".into(),
            currency: currency.to_string(),
            items: self.lines.iter().map(|l| DraftItem {
                product_id: l.product_id,
                name: l.product_name_snapshot.clone(),
                quantity: l.quantity(),
                unit_price: l.unit_price_current,
            }).collect(),
            subtotal: self.subtotal,
            tax: Decimal::ZERO,
            total: self.total,
        })
    }

    /// Folds a guest cart into this one, clamping each combined quantity to live stock.
    pub fn absorb(&mut self, guest: &Cart, catalog: &HashMap<Uuid, Product>) {
        if guest.id == self.id { return; }
        self.ensure_editable();
        for g in &guest.lines {
            let Some(product) = catalog.get(&g.product_id) else { continue };
            let existing = self.lines.iter().position(|l| l.product_id == g.product_id);
            let combined = existing.map_or(0, |i| self.lines[i].quantity()).saturating_add(g.quantity());
            let final_qty = combined.min(product.available().value());
            match existing {
                Some(i) if final_qty == 0 => { self.lines.remove(i); }
                Some(i) => {
                    let line = &mut self.lines[i];
                    line.quantity = clamp_i32(final_qty);
                    line.unit_price_current = product.price;
                    line.is_valid = true;
                }
                None if final_qty > 0 => {
                    let mut line = CartLine::new(product, final_qty);
                    line.unit_price_at_add = g.unit_price_at_add;
                    self.lines.push(line);
                }
                None => {}
            }
        }
        self.recalculate();
    }

    pub fn begin_payment(&mut self, preference_id: impl Into<String>) {
        self.mp_preference_id = Some(preference_id.into());
        self.mp_payment_id = None;
        self.status = CartStatus::Pending;
        self.touch();
    }

    pub fn record_payment_attempt(&mut self, payment_id: impl Into<String>) {
        self.mp_payment_id = Some(payment_id.into());
        self.status = CartStatus::Pending;
        self.touch();
    }

    /// Back to an editable cart after a rejected payment.
    pub fn reopen(&mut self) {
        self.status = CartStatus::Active;
        self.mp_preference_id = None;
        self.mp_payment_id = None;
        self.touch();
    }

    /// Keeps a payment that could not be turned into an order on the cart
    /// so support can find it, and marks the cart for the buyer.
    pub fn flag_payment(&mut self, payment_id: impl Into<String>) {
        self.mp_payment_id = Some(payment_id.into());
        self.needs_attention = true;
        self.touch();
    }

    /// Checks that an approved payment paid for the cart as it is now: the
    /// cart must still wait on the preference it was issued, and the paid
    /// amount, when the provider reports one, must equal the cart total.
    pub fn check_payment(&self, paid: Option<Decimal>) -> Result<(), PaymentMismatch> {
        if self.status != CartStatus::Pending || self.mp_preference_id.is_none() {
            return Err(PaymentMismatch::NotAwaitingPayment);
        }
        match paid.map(|amount| amount.round_dp(2)) {
            Some(paid) if paid != self.total => Err(PaymentMismatch::Amount { paid, expected: self.total }),
            _ => Ok(()),
        }
    }

    pub fn view(&self, catalog: &HashMap<Uuid, Product>, currency: &str) -> CartView {
        let items: Vec<CartItemView> = self.lines.iter().map(|l| {
            let available = catalog.get(&l.product_id).map(|p| p.available().value());
            let flags = CartItemFlags {
                price_changed: l.price_changed(),
                insufficient_stock: available.map_or(true, |a| a < l.quantity()),
                out_of_stock: available.map_or(true, |a| a == 0),
            };
            CartItemView {
                id: l.id,
                product_id: l.product_id,
                name: l.product_name_snapshot.clone(),
                img_url: l.image_url_snapshot.clone(),
                quantity: l.quantity(),
                unit_price_snapshot: l.unit_price_at_add,
                unit_price_current: l.unit_price_current,
                line_total_current: l.line_total(),
                is_valid: l.is_valid,
                flags,
            }
        }).collect();
        let invalid_items_count = items.iter().filter(|i| !i.is_valid || i.flags.insufficient_stock).count();
        CartView {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            items,
            summary: CartSummary {
                subtotal: self.subtotal,
                discount: Decimal::ZERO,
                tax: Decimal::ZERO,
                total: self.total,
                currency: currency.to_string(),
                invalid_items_count,
            },
        }
    }

    /// Editing a cart that is waiting on the provider invalidates the preference.
    fn ensure_editable(&mut self) {
        if self.status == CartStatus::Pending { self.reopen(); }
    }

    fn recalculate(&mut self) {
        self.subtotal = self.lines.iter().map(CartLine::line_total).sum::<Decimal>().round_dp(2);
        self.total = self.subtotal;
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn clamp_i32(value: u32) -> i32 { i32::try_from(value).unwrap_or(i32::MAX) }

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemFlags {
    pub price_changed: bool,
    pub insufficient_stock: bool,
    pub out_of_stock: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub img_url: Option<String>,
    pub quantity: u32,
    pub unit_price_snapshot: Decimal,
    pub unit_price_current: Decimal,
    pub line_total_current: Decimal,
    pub is_valid: bool,
    pub flags: CartItemFlags,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub invalid_items_count: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: CartStatus,
    pub items: Vec<CartItemView>,
    pub summary: CartSummary,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub order_id: Option<Uuid>,
    pub status: String,
    pub currency: String,
    pub items: Vec<DraftItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Insufficient stock")]
    InsufficientStock { product_id: Uuid, available: u32 },
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Cart is empty")]
    Empty,
    #[error("Cart needs attention")]
    NeedsAttention { changes: Vec<CartChange> },
    #[error("Unknown cart status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentMismatch {
    #[error("cart is not waiting for a payment")]
    NotAwaitingPayment,
    #[error("paid {paid}, cart totals {expected}")]
    Amount { paid: Decimal, expected: Decimal },
}
