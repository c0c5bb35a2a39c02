//! Payment gateway request, response and webhook types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Request body for `POST /payment_links`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentLink {
    /// Amount in minor units (paise, cents).
    pub amount: i64,
    pub currency: String,
    pub accept_partial: bool,
    pub description: String,
    /// Our payment row id, echoed back in webhooks.
    pub reference_id: String,
    pub customer: LinkCustomer,
    pub notify: LinkNotify,
    pub reminder_enable: bool,
    pub notes: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkCustomer {
    pub name: String,
    /// Phone with leading `+`.
    pub contact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Gateway-side notifications. Links are delivered over WhatsApp instead.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LinkNotify {
    pub sms: bool,
    pub email: bool,
}

/// A created payment link.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLink {
    pub id: String,
    pub short_url: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub code: Option<String>,
}

// =============================================================================
// Webhooks
// =============================================================================

/// A webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment_link: Option<EntityWrapper<WebhookLinkEntity>>,
    #[serde(default)]
    pub payment: Option<EntityWrapper<WebhookPaymentEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

/// The payment link part of a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookLinkEntity {
    pub id: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount_paid: Option<i64>,
    #[serde(default)]
    pub notes: Option<HashMap<String, serde_json::Value>>,
}

/// The captured payment part of a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPaymentEntity {
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub method: Option<String>,
}

impl WebhookEvent {
    pub const LINK_PAID: &'static str = "payment_link.paid";
    pub const LINK_CANCELLED: &'static str = "payment_link.cancelled";
    pub const LINK_EXPIRED: &'static str = "payment_link.expired";

    /// The payment link entity, if present.
    #[must_use]
    pub fn link(&self) -> Option<&WebhookLinkEntity> {
        self.payload.payment_link.as_ref().map(|w| &w.entity)
    }

    /// The payment entity, if present.
    #[must_use]
    pub fn payment(&self) -> Option<&WebhookPaymentEntity> {
        self.payload.payment.as_ref().map(|w| &w.entity)
    }

    /// Our payment row id from the link's `reference_id`.
    #[must_use]
    pub fn reference_id(&self) -> Option<i32> {
        self.link()
            .and_then(|l| l.reference_id.as_deref())
            .and_then(|r| r.trim().parse().ok())
    }

    /// Tenant id from the link's `notes.tenant_id` (string or number).
    #[must_use]
    pub fn tenant_id(&self) -> Option<i32> {
        let value = self.link()?.notes.as_ref()?.get("tenant_id")?;
        match value {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_paid() {
        let raw = r#"{
          "entity": "event",
          "event": "payment_link.paid",
          "payload": {
            "payment_link": {"entity": {"id": "plink_1", "reference_id": "42", "status": "paid",
                                        "amount_paid": 50000, "notes": {"tenant_id": "7"}}},
            "payment": {"entity": {"id": "pay_9", "amount": 50000, "method": "upi"}}
          }
        }"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event, WebhookEvent::LINK_PAID);
        assert_eq!(event.reference_id(), Some(42));
        assert_eq!(event.tenant_id(), Some(7));
        assert_eq!(event.payment().unwrap().id, "pay_9");
    }

    #[test]
    fn test_unrelated_event_parses_without_payload() {
        let event: WebhookEvent = serde_json::from_str(r#"{"event": "refund.created"}"#).unwrap();
        assert!(event.link().is_none());
        assert_eq!(event.reference_id(), None);
    }

    #[test]
    fn test_numeric_tenant_note() {
        let raw = r#"{"event": "payment_link.paid", "payload": {"payment_link": {"entity":
            {"id": "plink_2", "notes": {"tenant_id": 3}}}}}"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.tenant_id(), Some(3));
    }
}
