//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    User(UserEvent),
    Cart(CartEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    StockAdjusted { product_id: Uuid, stock: i32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, total: Decimal },
    Approved { order_id: Uuid, user_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UserEvent {
    Registered { user_id: Uuid, email: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CartEvent {
    Merged { user_cart_id: Uuid, guest_cart_id: Uuid },
}

impl DomainEvent {
    /// NATS subject the event is published under.
    pub fn subject(&self) -> String {
        let (aggregate, event) = match self {
            Self::Product(ProductEvent::StockAdjusted { .. }) => ("product", "stock_adjusted"),
            Self::Order(OrderEvent::Placed { .. }) => ("order", "placed"),
            Self::Order(OrderEvent::Approved { .. }) => ("order", "approved"),
            Self::User(UserEvent::Registered { .. }) => ("user", "registered"),
            Self::Cart(CartEvent::Merged { .. }) => ("cart", "merged"),
        };
        format!("repustore.{aggregate}.{event}")
    }
}
