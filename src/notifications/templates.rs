//! Mail bodies sent by the shop.

use super::{Invoice, MailAttachment, OutgoingMail};

const BRAND_RED: &str = "#D32F2F";

pub fn verification_mail(to: &str, name: &str, verify_url: &str) -> OutgoingMail {
    let body = format!(
        r#"<h2 style="margin-bottom: 10px; color: {BRAND_RED};">¡Hola {name}!</h2>
    <p style="font-size: 16px; color: #000;">Gracias por registrarte. Confirmá tu cuenta para empezar a comprar.</p>
    <a href="{url}" style="display:inline-block; margin-top:15px; padding:12px 25px; background:#000000; color:#ffffff; text-decoration:none; font-weight:bold; border-radius:5px;">Verificar cuenta</a>"#,
        name = escape_html(name),
        url = escape_html(verify_url),
    );
    OutgoingMail {
        to: vec![to.to_string()],
        subject: "Verificá tu cuenta en RepuStore".into(),
        html: layout(&body),
        attachments: vec![],
    }
}

/// Customer copy plus the store mailbox, with the PDF invoice attached.
pub fn order_approved_mail(invoice: &Invoice, store_mail: Option<&str>, frontend_url: &str) -> OutgoingMail {
    let body = format!(
        r#"<h2 style="margin-bottom: 10px; color: {BRAND_RED};">¡Tu pedido está aprobado!</h2>
    <p style="font-size: 16px; color: #000;">El pedido con ID <b>{id}</b> ya está <span style="color: {BRAND_RED}; font-weight: bold;">listo para retirar</span>.</p>
    <p style="font-size: 15px; margin-top: 20px; color: #000;">Gracias por confiar en <b style="color: {BRAND_RED};">RepuStore</b>. Podés ver los detalles desde tu perfil:</p>
    <a href="{url}/profile" style="display:inline-block; margin-top:15px; padding:12px 25px; background:#000000; color:#ffffff; text-decoration:none; font-weight:bold; border-radius:5px;">Ver mis órdenes</a>"#,
        id = invoice.order_id,
        url = escape_html(frontend_url),
    );
    let mut to = vec![invoice.customer_email.clone()];
    if let Some(store) = store_mail.filter(|s| !s.is_empty() && *s != invoice.customer_email) {
        to.push(store.to_string());
    }
    OutgoingMail {
        to,
        subject: format!("Pedido aprobado - #{}", invoice.order_id),
        html: layout(&body),
        attachments: vec![MailAttachment {
            filename: invoice.filename(),
            content_type: "application/pdf".into(),
            data: invoice.render_pdf(),
        }],
    }
}

fn layout(body: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; background-color: #ffffff; padding: 20px; border-radius: 8px; max-width: 600px; margin: auto; border: 1px solid #ddd; color: #000000;">
  <div style="background-color: {BRAND_RED}; padding: 15px; text-align: center; color: #ffffff; border-radius: 6px 6px 0 0;">
    <h1 style="margin: 0; font-size: 22px;">RepuStore</h1>
  </div>
  <div style="padding: 20px; text-align: center;">
    {body}
  </div>
  <div style="background-color: {BRAND_RED}; color: #fff; padding: 10px; text-align: center; border-radius: 0 0 6px 6px; font-size: 13px;">
    RepuStore - Todos los derechos reservados
  </div>
</div>"#
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
