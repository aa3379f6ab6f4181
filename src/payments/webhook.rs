//! Parsing of provider notifications.

use std::collections::HashMap;

use super::MerchantOrderPayment;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Payment(String),
    MerchantOrder(String),
    /// Carries an id but a topic the shop does not act on.
    Other { topic: String, id: String },
}

/// Reads `type|topic` and `data.id|id` from the webhook query.
/// Returns `None` when no id is present.
pub fn parse_notification(query: &HashMap<String, String>) -> Option<Notification> {
    let non_empty = |key: &str| query.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
    let topic = non_empty("type").or_else(|| non_empty("topic")).unwrap_or_default();
    let data_id = non_empty("data.id");
    let id = data_id.or_else(|| non_empty("id"))?.to_string();

    if topic == "payment" || data_id.is_some() {
        return Some(Notification::Payment(id));
    }
    if topic == "merchant_order" {
        return Some(Notification::MerchantOrder(id));
    }
    Some(Notification::Other { topic: topic.to_string(), id })
}

/// First approved payment of a merchant order, otherwise the latest one.
pub fn choose_payment(payments: &[MerchantOrderPayment]) -> Option<&MerchantOrderPayment> {
    payments.iter().find(|p| p.status == "approved").or_else(|| payments.last())
}
