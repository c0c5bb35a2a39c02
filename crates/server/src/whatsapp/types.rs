//! WhatsApp Cloud API types.
//!
//! Outbound content is converted to the Graph API JSON shape by
//! [`OutboundContent::to_payload`]; webhook payloads deserialize into
//! [`WebhookPayload`], with every collection defaulting to empty so that
//! partial change objects still parse.

use parley_core::MessageKind;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Maximum length of a WhatsApp text body.
pub const MAX_TEXT_LENGTH: usize = 4096;

// =============================================================================
// Outbound
// =============================================================================

/// Per-tenant credentials for the Cloud API.
#[derive(Clone)]
pub struct WhatsAppCredentials {
    /// Business phone number id messages are sent from.
    pub phone_number_id: String,
    /// Long-lived system user access token.
    pub access_token: SecretString,
}

impl std::fmt::Debug for WhatsAppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppCredentials")
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Message content the CRM can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundContent {
    /// Plain text.
    Text { body: String },
    /// An image by public URL.
    Image {
        link: String,
        #[serde(default)]
        caption: Option<String>,
    },
    /// A document by public URL.
    Document {
        link: String,
        #[serde(default)]
        filename: Option<String>,
        #[serde(default)]
        caption: Option<String>,
    },
}

#[derive(Serialize)]
struct MediaObject<'a> {
    link: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
}

impl OutboundContent {
    /// The stored message kind.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Image { .. } => MessageKind::Image,
            Self::Document { .. } => MessageKind::Document,
        }
    }

    /// Text body or caption, as stored in the message row.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Text { body } => Some(body),
            Self::Image { caption, .. } | Self::Document { caption, .. } => caption.as_deref(),
        }
    }

    /// Media URL, if any.
    #[must_use]
    pub fn media_url(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::Image { link, .. } | Self::Document { link, .. } => Some(link),
        }
    }

    /// Document filename, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Document { filename, .. } => filename.as_deref(),
            _ => None,
        }
    }

    /// Check the content before anything is persisted.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Text { body } => {
                if body.trim().is_empty() {
                    return Err("message body cannot be empty".to_string());
                }
                if body.chars().count() > MAX_TEXT_LENGTH {
                    return Err(format!(
                        "message body exceeds {MAX_TEXT_LENGTH} characters"
                    ));
                }
            }
            Self::Image { link, .. } | Self::Document { link, .. } => {
                let url = url::Url::parse(link).map_err(|e| format!("invalid media link: {e}"))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err("media link must be http(s)".to_string());
                }
            }
        }
        Ok(())
    }

    /// Build the `/messages` request body for a recipient.
    #[must_use]
    pub fn to_payload(&self, to: &str) -> Value {
        let (kind, object) = match self {
            Self::Text { body } => ("text", json!({ "preview_url": false, "body": body })),
            Self::Image { link, caption } => (
                "image",
                json!(MediaObject {
                    link,
                    caption: caption.as_deref(),
                    filename: None,
                }),
            ),
            Self::Document {
                link,
                filename,
                caption,
            } => (
                "document",
                json!(MediaObject {
                    link,
                    caption: caption.as_deref(),
                    filename: filename.as_deref(),
                }),
            ),
        };

        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": kind,
        });
        if let Some(map) = payload.as_object_mut() {
            map.insert(kind.to_string(), object);
        }
        payload
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// WhatsApp message id used to correlate status callbacks.
    pub wamid: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct SendMessageResponse {
    #[serde(default)]
    pub messages: Vec<SentMessageId>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SentMessageId {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GraphErrorResponse {
    pub error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct GraphErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

/// Media metadata returned by `GET /{media_id}`.
#[derive(Debug, Deserialize)]
pub(super) struct MediaUrlResponse {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Downloaded inbound media.
#[derive(Debug, Clone)]
pub struct MediaDownload {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

// =============================================================================
// Webhooks
// =============================================================================

/// Top-level webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    pub value: WebhookChangeValue,
}

/// The `value` of one change: messages and/or statuses for one phone number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChangeValue {
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<StatusUpdate>,
}

impl WebhookChangeValue {
    /// The business phone number id the change was delivered to.
    #[must_use]
    pub fn phone_number_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .map(|m| m.phone_number_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Profile name WhatsApp reported for a sender.
    #[must_use]
    pub fn profile_name(&self, wa_id: &str) -> Option<&str> {
        self.contacts
            .iter()
            .find(|c| c.wa_id == wa_id)
            .and_then(|c| c.profile.as_ref())
            .map(|p| p.name.as_str())
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub display_phone_number: String,
    #[serde(default)]
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<WebhookProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookProfile {
    #[serde(default)]
    pub name: String,
}

/// One inbound message.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub image: Option<MediaRef>,
    #[serde(default)]
    pub document: Option<MediaRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// Reference to media held by WhatsApp.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaRef {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl InboundMessage {
    /// Stored kind; unsupported types are stored as text placeholders.
    #[must_use]
    pub fn message_kind(&self) -> MessageKind {
        match self.kind.as_str() {
            "image" if self.image.is_some() => MessageKind::Image,
            "document" if self.document.is_some() => MessageKind::Document,
            _ => MessageKind::Text,
        }
    }

    /// Media attached to the message, if the kind carries any.
    #[must_use]
    pub fn media(&self) -> Option<&MediaRef> {
        match self.message_kind() {
            MessageKind::Image => self.image.as_ref(),
            MessageKind::Document => self.document.as_ref(),
            MessageKind::Text => None,
        }
    }

    /// Body to store: text, caption, or a placeholder for unsupported types.
    #[must_use]
    pub fn body(&self) -> Option<String> {
        if let Some(text) = &self.text {
            return Some(text.body.clone());
        }
        if let Some(media) = self.media() {
            return media.caption.clone();
        }
        Some(format!("[unsupported message type: {}]", self.kind))
    }

    /// Sent-at timestamp from the Unix-seconds string.
    #[must_use]
    pub fn sent_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
    }
}

/// One status callback for a message the business sent.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    /// The `wamid` of the outbound message.
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<StatusError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusUpdate {
    /// Human-readable failure reason, if the callback carried one.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.errors.first().map(|e| {
            let text = e
                .message
                .as_deref()
                .or(e.title.as_deref())
                .unwrap_or("delivery failed");
            e.code.map_or_else(|| text.to_string(), |code| format!("{code}: {text}"))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_text_payload_shape() {
        let content = OutboundContent::Text {
            body: "Your order shipped".to_string(),
        };
        let payload = content.to_payload("919876543210");
        assert_eq!(payload["messaging_product"], "whatsapp");
        assert_eq!(payload["recipient_type"], "individual");
        assert_eq!(payload["to"], "919876543210");
        assert_eq!(payload["type"], "text");
        assert_eq!(payload["text"]["body"], "Your order shipped");
    }

    #[test]
    fn test_document_payload_omits_missing_caption() {
        let content = OutboundContent::Document {
            link: "https://files.example/q-12.pdf".to_string(),
            filename: Some("Quotation-12.pdf".to_string()),
            caption: None,
        };
        let payload = content.to_payload("15551234567");
        assert_eq!(payload["type"], "document");
        assert_eq!(payload["document"]["filename"], "Quotation-12.pdf");
        assert!(payload["document"].get("caption").is_none());
    }

    #[test]
    fn test_validate() {
        assert!(OutboundContent::Text { body: "  ".into() }.validate().is_err());
        assert!(
            OutboundContent::Text {
                body: "a".repeat(MAX_TEXT_LENGTH + 1)
            }
            .validate()
            .is_err()
        );
        assert!(
            OutboundContent::Image {
                link: "ftp://x/y.png".into(),
                caption: None
            }
            .validate()
            .is_err()
        );
        assert!(
            OutboundContent::Image {
                link: "https://i.example/y.png".into(),
                caption: None
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn test_outbound_content_deserializes_tagged() {
        let content: OutboundContent =
            serde_json::from_str(r#"{"type":"image","link":"https://i.example/a.jpg"}"#).unwrap();
        assert_eq!(content.kind(), MessageKind::Image);
        assert_eq!(content.body(), None);
    }

    #[test]
    fn test_parse_inbound_webhook() {
        let raw = r#"{
          "object": "whatsapp_business_account",
          "entry": [{
            "id": "WABA",
            "changes": [{
              "field": "messages",
              "value": {
                "messaging_product": "whatsapp",
                "metadata": {"display_phone_number": "15550001111", "phone_number_id": "1090"},
                "contacts": [{"profile": {"name": "Asha"}, "wa_id": "919876543210"}],
                "messages": [
                  {"from": "919876543210", "id": "wamid.A", "timestamp": "1700000000",
                   "type": "text", "text": {"body": "Hi"}},
                  {"from": "919876543210", "id": "wamid.B", "timestamp": "1700000001",
                   "type": "image", "image": {"id": "MEDIA1", "mime_type": "image/jpeg", "caption": "this one"}},
                  {"from": "919876543210", "id": "wamid.C", "type": "sticker", "sticker": {"id": "S"}}
                ]
              }
            }]
          }]
        }"#;

        let payload: WebhookPayload = serde_json::from_str(raw).unwrap();
        let value = &payload.entry[0].changes[0].value;
        assert_eq!(value.phone_number_id(), Some("1090"));
        assert_eq!(value.profile_name("919876543210"), Some("Asha"));

        let text = &value.messages[0];
        assert_eq!(text.message_kind(), MessageKind::Text);
        assert_eq!(text.body().as_deref(), Some("Hi"));
        assert!(text.sent_at().is_some());

        let image = &value.messages[1];
        assert_eq!(image.message_kind(), MessageKind::Image);
        assert_eq!(image.media().unwrap().id, "MEDIA1");
        assert_eq!(image.body().as_deref(), Some("this one"));

        let sticker = &value.messages[2];
        assert_eq!(sticker.message_kind(), MessageKind::Text);
        assert_eq!(
            sticker.body().as_deref(),
            Some("[unsupported message type: sticker]")
        );
    }

    #[test]
    fn test_parse_status_callback() {
        let raw = r#"{"metadata": {"phone_number_id": "1090"},
          "statuses": [{"id": "wamid.X", "status": "failed", "recipient_id": "1555",
                        "errors": [{"code": 131026, "title": "Message undeliverable"}]}]}"#;
        let value: WebhookChangeValue = serde_json::from_str(raw).unwrap();
        let status = &value.statuses[0];
        assert_eq!(status.status, "failed");
        assert_eq!(
            status.error_message().as_deref(),
            Some("131026: Message undeliverable")
        );
        assert!(value.messages.is_empty());
    }
}
