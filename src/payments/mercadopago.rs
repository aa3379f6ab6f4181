use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{MerchantOrder, Payment, PaymentError, PaymentGateway, Preference, PreferenceRequest};

const API_BASE: &str = "https://api.mercadopago.com";

pub struct MercadoPagoClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl MercadoPagoClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, PaymentError> {
        Self::with_base_url(access_token, API_BASE)
    }

    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { http, access_token: access_token.into(), base_url: base_url.into() })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PaymentError> {
        let response = self.http.get(format!("{}{}", self.base_url, path)).bearer_auth(&self.access_token).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PaymentError::Api { status: status.as_u16(), body });
    }
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| PaymentError::UnexpectedResponse(e.to_string()))
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference, PaymentError> {
        let response = self
            .http
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;
        let preference: Preference = read_json(response).await?;
        if preference.checkout_url().is_none() {
            return Err(PaymentError::UnexpectedResponse(format!("preference {} has no init_point", preference.id)));
        }
        Ok(preference)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, PaymentError> {
        self.get(&format!("/v1/payments/{}", urlencoding::encode(payment_id))).await
    }

    async fn get_merchant_order(&self, merchant_order_id: &str) -> Result<MerchantOrder, PaymentError> {
        self.get(&format!("/merchant_orders/{}", urlencoding::encode(merchant_order_id))).await
    }
}
