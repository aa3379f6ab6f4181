//! Payment provider integration.
//!
//! The shop talks to Mercado Pago's REST API through [`PaymentGateway`];
//! handlers and services never see the HTTP client directly.

pub mod mercadopago;
pub mod webhook;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use mercadopago::MercadoPagoClient;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider is not configured (MP_ACCESS_TOKEN)")]
    NotConfigured,
    #[error("Payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Payment provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Unexpected payment provider response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    pub currency_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub external_reference: String,
    pub notification_url: String,
    pub back_urls: BackUrls,
    pub auto_return: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: Option<String>,
    pub sandbox_init_point: Option<String>,
}

impl Preference {
    pub fn checkout_url(&self) -> Option<&str> {
        self.init_point.as_deref().or(self.sandbox_init_point.as_deref())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Payment {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub status: String,
    pub external_reference: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MerchantOrderPayment {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub status: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MerchantOrder {
    #[serde(default)]
    pub payments: Vec<MerchantOrderPayment>,
}

/// Provider ids arrive as JSON numbers or strings depending on the endpoint.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected id: {other}"))),
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference, PaymentError>;
    async fn get_payment(&self, payment_id: &str) -> Result<Payment, PaymentError>;
    async fn get_merchant_order(&self, merchant_order_id: &str) -> Result<MerchantOrder, PaymentError>;
}

/// Stand-in used when no access token is configured.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_preference(&self, _request: &PreferenceRequest) -> Result<Preference, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
    async fn get_payment(&self, _payment_id: &str) -> Result<Payment, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
    async fn get_merchant_order(&self, _merchant_order_id: &str) -> Result<MerchantOrder, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}

/// What a provider payment status means for the cart it pays for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentDecision {
    /// Turn the cart into an order.
    Approve,
    /// Give the cart back to the buyer.
    Reject,
    /// Remember the payment id and wait for the next notification.
    Hold,
}

impl PaymentDecision {
    pub fn from_status(status: &str, force_success: bool) -> Self {
        match status {
            "rejected" | "cancelled" | "refunded" | "charged_back" | "failure" => Self::Reject,
            "approved" => Self::Approve,
            _ if force_success => Self::Approve,
            _ => Self::Hold,
        }
    }
}
