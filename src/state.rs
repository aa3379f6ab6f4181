use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::media::{CloudinaryStore, DisabledImageStore, ImageStore};
use crate::notifications::{LogMailer, Mailer, SmtpMailer};
use crate::payments::{DisabledGateway, MercadoPagoClient, PaymentGateway};
use crate::publisher::EventPublisher;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub events: EventPublisher,
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub images: Arc<dyn ImageStore>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Wires the real integrations; each one falls back to a disabled
    /// stand-in when its configuration block is absent.
    pub fn from_config(config: Config, db: PgPool, events: EventPublisher) -> anyhow::Result<Self> {
        let payments: Arc<dyn PaymentGateway> = match &config.mercadopago {
            Some(mp) => Arc::new(MercadoPagoClient::new(mp.access_token.clone())?),
            None => {
                tracing::warn!("MP_ACCESS_TOKEN not set, checkout is disabled");
                Arc::new(DisabledGateway)
            }
        };
        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                tracing::warn!("SMTP not configured, mails will only be logged");
                Arc::new(LogMailer)
            }
        };
        let images: Arc<dyn ImageStore> = match &config.cloudinary {
            Some(c) => Arc::new(CloudinaryStore::new(c.clone())?),
            None => {
                tracing::warn!("Cloudinary not configured, image uploads are disabled");
                Arc::new(DisabledImageStore)
            }
        };
        Ok(Self {
            db,
            config: Arc::new(config),
            events,
            payments,
            mailer,
            images,
            http: reqwest::Client::new(),
        })
    }
}
