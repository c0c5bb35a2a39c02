//! WhatsApp Cloud API integration.
//!
//! This module provides:
//! - [`WhatsAppClient`] for sending messages (with bounded retry) and
//!   downloading inbound media
//! - Outbound content and tenant credential types
//! - Webhook payload types for inbound messages and status callbacks
//!
//! # Delivery
//!
//! 1. A `pending` message row is written before the client is called
//! 2. The client POSTs to `/{phone_number_id}/messages`, retrying 5xx and
//!    network failures with doubling delays
//! 3. The row becomes `sent` (with the `wamid`) or `failed`
//! 4. Later status callbacks move it to `delivered`/`read`

mod client;
mod error;
mod types;

pub use client::{RetryPolicy, WhatsAppClient};
pub use error::WhatsAppError;
pub use types::{
    InboundMessage, MediaDownload, MediaRef, OutboundContent, SendResult, StatusUpdate,
    WebhookChangeValue, WebhookContact, WebhookPayload, WhatsAppCredentials,
};
