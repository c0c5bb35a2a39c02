//! Chat messages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parley_core::{ContactId, MessageDirection, MessageId, MessageKind, MessageStatus};

/// One WhatsApp message, inbound or outbound.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub contact_id: ContactId,
    pub direction: MessageDirection,
    pub kind: MessageKind,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub filename: Option<String>,
    pub wamid: Option<String>,
    pub status: MessageStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub contact_id: ContactId,
    pub direction: MessageDirection,
    pub kind: MessageKind,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub filename: Option<String>,
    pub wamid: Option<String>,
    pub status: MessageStatus,
}
