//! Order Aggregate

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::cart::Cart;
use crate::domain::aggregates::product::{Product, ProductError};
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    OnPreparation,
    Approved,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnPreparation => "on_preparation",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Accepts the stored form plus the legacy spellings older rows carry.
    pub fn parse(value: &str) -> Result<Self, OrderError> {
        let normalized: String = value.chars().filter(|c| !c.is_whitespace() && *c != '_').collect::<String>().to_lowercase();
        match normalized.as_str() {
            "onpreparation" | "enpreparacion" => Ok(Self::OnPreparation),
            "approved" => Ok(Self::Approved),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(OrderError::UnknownStatus(value.to_string())),
        }
    }

    pub fn counts_as_sale(&self) -> bool { matches!(self, Self::Approved | Self::Completed) }
}

/// Row shape of the `orders` table.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: DateTime<Utc>,
    pub status: String,
    pub payment_status: String,
    pub total: Decimal,
    pub currency: String,
    pub mp_preference_id: Option<String>,
    pub mp_payment_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn quantity(&self) -> u32 { u32::try_from(self.quantity).unwrap_or(0) }
    pub fn subtotal(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity()) }
}

/// Provider references carried by an order paid through checkout.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRef {
    pub preference_id: Option<String>,
    pub payment_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    user_id: Uuid,
    date: DateTime<Utc>,
    status: OrderStatus,
    payment_status: String,
    total: Decimal,
    currency: String,
    #[serde(flatten)]
    payment: PaymentRef,
    items: Vec<OrderItem>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    /// Direct order: one line per requested product, priced at the live price.
    pub fn place(user_id: Uuid, lines: &[(&Product, u32)], currency: &str) -> Result<Self, OrderError> {
        let mut order = Self::empty(user_id, currency, PaymentRef::default(), "approved");
        for (product, quantity) in lines {
            if *quantity == 0 { return Err(OrderError::InvalidQuantity); }
            order.push_item(product.id, &product.name, *quantity, product.price);
        }
        order.seal()
    }

    /// Order for a cart whose payment the provider confirmed.
    pub fn from_paid_cart(cart: &Cart, payment: PaymentRef, currency: &str) -> Result<Self, OrderError> {
        let user_id = cart.user_id().ok_or(OrderError::GuestCart)?;
        let mut order = Self::empty(user_id, currency, payment, "approved");
        for line in cart.lines() {
            order.push_item(line.product_id, &line.product_name_snapshot, line.quantity(), line.unit_price_current);
        }
        order.seal()
    }

    pub fn from_record(record: OrderRecord, items: Vec<OrderItem>) -> Result<Self, OrderError> {
        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            date: record.date,
            status: OrderStatus::parse(&record.status)?,
            payment_status: record.payment_status,
            total: record.total,
            currency: record.currency,
            payment: PaymentRef { preference_id: record.mp_preference_id, payment_id: record.mp_payment_id },
            items,
            events: vec![],
        })
    }

    pub fn record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            status: self.status.as_str().to_string(),
            payment_status: self.payment_status.clone(),
            total: self.total,
            currency: self.currency.clone(),
            mp_preference_id: self.payment.preference_id.clone(),
            mp_payment_id: self.payment.payment_id.clone(),
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn date(&self) -> DateTime<Utc> { self.date }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> &str { &self.payment_status }
    pub fn total(&self) -> Decimal { self.total }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn payment(&self) -> &PaymentRef { &self.payment }
    pub fn items(&self) -> &[OrderItem] { &self.items }

    /// Takes the ordered units out of the given products.
    ///
    /// On error the catalog may be partially modified and must be discarded.
    pub fn reserve_stock(&self, catalog: &mut HashMap<Uuid, Product>) -> Result<(), OrderError> {
        for item in &self.items {
            let product = catalog.get_mut(&item.product_id).ok_or(OrderError::ProductMissing(item.product_id))?;
            product.remove_stock(item.quantity())?;
        }
        Ok(())
    }

    pub fn approve(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::OnPreparation {
            return Err(OrderError::CannotApprove(self.status));
        }
        self.status = OrderStatus::Approved;
        self.raise_event(DomainEvent::Order(OrderEvent::Approved { order_id: self.id, user_id: self.user_id }));
        Ok(())
    }

    pub fn set_payment_status(&mut self, status: impl Into<String>, payment_id: Option<String>) {
        self.payment_status = status.into();
        if payment_id.is_some() { self.payment.payment_id = payment_id; }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn empty(user_id: Uuid, currency: &str, payment: PaymentRef, payment_status: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            date: Utc::now(),
            status: OrderStatus::OnPreparation,
            payment_status: payment_status.to_string(),
            total: Decimal::ZERO,
            currency: currency.to_string(),
            payment,
            items: vec![],
            events: vec![],
        }
    }

    fn push_item(&mut self, product_id: Uuid, name: &str, quantity: u32, unit_price: Decimal) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            existing.quantity = existing.quantity.saturating_add(i32::try_from(quantity).unwrap_or(i32::MAX));
            return;
        }
        self.items.push(OrderItem {
            id: Uuid::now_v7(),
            order_id: self.id,
            product_id,
            product_name: name.to_string(),
            quantity: i32::try_from(quantity).unwrap_or(i32::MAX),
            unit_price,
        });
    }

    fn seal(mut self) -> Result<Self, OrderError> {
        if self.items.is_empty() { return Err(OrderError::NoItems); }
        self.total = self.items.iter().map(OrderItem::subtotal).sum::<Decimal>().round_dp(2);
        self.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: self.id, user_id: self.user_id, total: self.total }));
        Ok(self)
    }

    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Guest carts cannot be turned into orders")]
    GuestCart,
    #[error("Product {0} not found")]
    ProductMissing(Uuid),
    #[error(transparent)]
    Stock(#[from] ProductError),
    #[error("Order status must be 'on_preparation' to approve. Current: {0:?}")]
    CannotApprove(OrderStatus),
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

// =============================================================================
// Sales report
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesByDate {
    pub date: String,
    pub quantity: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: Uuid,
    pub product_name: String,
    pub total_quantity: u64,
    pub total_revenue: Decimal,
    pub sales_by_date: Vec<SalesByDate>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_orders: usize,
    pub total_revenue: Decimal,
    pub total_products_sold: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub sales: Vec<ProductSales>,
    pub summary: SalesSummary,
}

impl SalesReport {
    /// Aggregates approved and completed orders per product and per day.
    pub fn from_orders(orders: &[Order]) -> Self {
        let counted: Vec<&Order> = orders.iter().filter(|o| o.status.counts_as_sale()).collect();
        let mut per_product: BTreeMap<Uuid, (String, u64, Decimal, BTreeMap<String, u64>)> = BTreeMap::new();
        for order in &counted {
            let day = order.date.format("%Y-%m-%d").to_string();
            for item in &order.items {
                let entry = per_product
                    .entry(item.product_id)
                    .or_insert_with(|| (item.product_name.clone(), 0, Decimal::ZERO, BTreeMap::new()));
                entry.1 += u64::from(item.quantity());
                entry.2 += item.subtotal();
                *entry.3.entry(day.clone()).or_insert(0) += u64::from(item.quantity());
            }
        }
        let sales: Vec<ProductSales> = per_product
            .into_iter()
            .map(|(product_id, (product_name, total_quantity, total_revenue, days))| ProductSales {
                product_id,
                product_name,
                total_quantity,
                total_revenue,
                sales_by_date: days.into_iter().map(|(date, quantity)| SalesByDate { date, quantity }).collect(),
            })
            .collect();
        let summary = SalesSummary {
            total_orders: counted.len(),
            total_revenue: sales.iter().map(|s| s.total_revenue).sum(),
            total_products_sold: sales.iter().map(|s| s.total_quantity).sum(),
        };
        Self { sales, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::fixtures::product;
    use rust_decimal_macros::dec;

    #[test]
    fn test_place_merges_duplicate_products_and_totals() {
        let a = product("Filtro", dec!(10.50), 5);
        let b = product("Aceite", dec!(30), 5);
        let order = Order::place(Uuid::new_v4(), &[(&a, 2), (&b, 1), (&a, 1)], "ARS").unwrap();
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.items()[0].quantity, 3);
        assert_eq!(order.total(), dec!(61.50));
        assert_eq!(order.status(), OrderStatus::OnPreparation);
    }

    #[test]
    fn test_place_rejects_empty_and_zero_quantity() {
        let a = product("Filtro", dec!(10), 5);
        assert_eq!(Order::place(Uuid::new_v4(), &[], "ARS").unwrap_err(), OrderError::NoItems);
        assert_eq!(Order::place(Uuid::new_v4(), &[(&a, 0)], "ARS").unwrap_err(), OrderError::InvalidQuantity);
    }

    #[test]
    fn test_from_paid_cart_uses_current_prices() {
        let mut a = product("Filtro", dec!(10), 5);
        let user = Uuid::new_v4();
        let mut cart = Cart::for_user(user);
        cart.add_item(&a, 2).unwrap();
        a.price = dec!(12);
        cart.add_item(&a, 1).unwrap();
        let payment = PaymentRef { preference_id: Some("pref".into()), payment_id: Some("123".into()) };
        let mut order = Order::from_paid_cart(&cart, payment, "ARS").unwrap();
        assert_eq!(order.user_id(), user);
        assert_eq!(order.total(), dec!(36));
        assert_eq!(order.payment().payment_id.as_deref(), Some("123"));
        assert!(matches!(order.take_events().as_slice(), [DomainEvent::Order(OrderEvent::Placed { .. })]));
    }

    #[test]
    fn test_from_guest_cart_fails() {
        let a = product("Filtro", dec!(10), 5);
        let mut cart = Cart::new_guest();
        cart.add_item(&a, 1).unwrap();
        assert_eq!(Order::from_paid_cart(&cart, PaymentRef::default(), "ARS").unwrap_err(), OrderError::GuestCart);
    }

    #[test]
    fn test_reserve_stock() {
        let a = product("Filtro", dec!(10), 3);
        let b = product("Aceite", dec!(5), 1);
        let order = Order::place(Uuid::new_v4(), &[(&a, 2), (&b, 1)], "ARS").unwrap();
        let mut catalog: HashMap<Uuid, Product> = [(a.id, a.clone()), (b.id, b.clone())].into();
        order.reserve_stock(&mut catalog).unwrap();
        assert_eq!(catalog[&a.id].stock, 1);
        assert_eq!(catalog[&b.id].stock, 0);

        let err = order.reserve_stock(&mut catalog).unwrap_err();
        assert!(matches!(err, OrderError::Stock(ProductError::InsufficientStock { requested: 2, available: 1, .. })));

        let mut missing = HashMap::new();
        assert_eq!(order.reserve_stock(&mut missing).unwrap_err(), OrderError::ProductMissing(a.id));
    }

    #[test]
    fn test_approve_only_from_preparation() {
        let a = product("Filtro", dec!(10), 3);
        let mut order = Order::place(Uuid::new_v4(), &[(&a, 1)], "ARS").unwrap();
        order.take_events();
        order.approve().unwrap();
        assert_eq!(order.status(), OrderStatus::Approved);
        assert_eq!(order.approve().unwrap_err(), OrderError::CannotApprove(OrderStatus::Approved));
        assert_eq!(order.take_events().len(), 1);
    }

    #[test]
    fn test_status_parse_accepts_legacy_spellings() {
        assert_eq!(OrderStatus::parse("En Preparacion").unwrap(), OrderStatus::OnPreparation);
        assert_eq!(OrderStatus::parse("onPreparation").unwrap(), OrderStatus::OnPreparation);
        assert_eq!(OrderStatus::parse("on_preparation").unwrap(), OrderStatus::OnPreparation);
        assert!(OrderStatus::parse("shipped").is_err());
    }

    #[test]
    fn test_sales_report() {
        let a = product("Filtro", dec!(10), 10);
        let b = product("Aceite", dec!(5), 10);
        let user = Uuid::new_v4();
        let mut approved = Order::place(user, &[(&a, 2), (&b, 1)], "ARS").unwrap();
        approved.approve().unwrap();
        let mut second = Order::place(user, &[(&a, 1)], "ARS").unwrap();
        second.approve().unwrap();
        let pending = Order::place(user, &[(&a, 5)], "ARS").unwrap();

        let report = SalesReport::from_orders(&[approved, second, pending]);
        assert_eq!(report.summary.total_orders, 2);
        assert_eq!(report.summary.total_products_sold, 4);
        assert_eq!(report.summary.total_revenue, dec!(35));
        let filter = report.sales.iter().find(|s| s.product_id == a.id).unwrap();
        assert_eq!(filter.total_quantity, 3);
        assert_eq!(filter.sales_by_date.len(), 1);
        assert_eq!(filter.sales_by_date[0].quantity, 3);
    }
}
