use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{MailError, Mailer, OutgoingMail};
use crate::config::SmtpConfig;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .credentials(Credentials::new(config.user.clone(), config.password.clone()))
            .build();
        let from = config.from.parse().map_err(|_| MailError::Address(config.from.clone()))?;
        Ok(Self { transport, from })
    }
}

fn build_message(from: &Mailbox, mail: OutgoingMail) -> Result<Message, MailError> {
    let mut builder = Message::builder().from(from.clone()).subject(mail.subject);
    for to in &mail.to {
        let mailbox: Mailbox = to.parse().map_err(|_| MailError::Address(to.clone()))?;
        builder = builder.to(mailbox);
    }
    let html = SinglePart::html(mail.html);
    let message = if mail.attachments.is_empty() {
        builder.singlepart(html)
    } else {
        let mut body = MultiPart::mixed().singlepart(html);
        for attachment in mail.attachments {
            let content_type =
                ContentType::parse(&attachment.content_type).map_err(|e| MailError::Build(e.to_string()))?;
            body = body.singlepart(Attachment::new(attachment.filename).body(attachment.data, content_type));
        }
        builder.multipart(body)
    };
    message.map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let subject = mail.subject.clone();
        let message = build_message(&self.from, mail)?;
        self.transport.send(message).await.map_err(|e| MailError::Transport(e.to_string()))?;
        tracing::info!(%subject, "mail sent");
        Ok(())
    }
}

/// Used when SMTP is not configured: mails are logged and dropped.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = ?mail.to,
            subject = %mail.subject,
            attachments = mail.attachments.len(),
            "SMTP not configured, mail not sent"
        );
        Ok(())
    }
}
