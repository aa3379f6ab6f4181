//! Outgoing e-mail: transport, templates and the invoice attachment.

pub mod invoice;
pub mod mailer;
pub mod templates;

use async_trait::async_trait;
use thiserror::Error;

pub use invoice::{Invoice, InvoiceLine};
pub use mailer::{LogMailer, SmtpMailer};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {0}")]
    Address(String),
    #[error("could not build message: {0}")]
    Build(String),
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<MailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}
