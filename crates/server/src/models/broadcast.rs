//! Broadcast campaigns.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parley_core::{
    BroadcastId, BroadcastRecipientId, BroadcastStatus, ContactId, MessageId, RecipientStatus,
};

/// A message sent to many contacts.
#[derive(Debug, Clone, Serialize)]
pub struct Broadcast {
    pub id: BroadcastId,
    pub name: String,
    pub body: String,
    pub status: BroadcastStatus,
    pub sent_count: i32,
    pub failed_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Delivery state for one contact of a broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastRecipient {
    pub id: BroadcastRecipientId,
    pub contact_id: ContactId,
    pub status: RecipientStatus,
    pub message_id: Option<MessageId>,
    pub error: Option<String>,
}
