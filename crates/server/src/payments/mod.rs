//! Payment gateway integration (Razorpay-compatible API).
//!
//! This module provides:
//! - [`PaymentGatewayClient`] for creating and cancelling payment links
//! - Webhook event types and signature verification
//!
//! # Flow
//!
//! 1. A pending payment row is created for an order or quotation
//! 2. A payment link is created with `reference_id` = the payment row id and
//!    the tenant id in `notes`
//! 3. The customer pays; the gateway posts `payment_link.paid`
//! 4. The webhook handler verifies `X-Razorpay-Signature`, marks the payment
//!    paid and recomputes the target's settlement

mod client;
mod error;
mod types;

pub use client::PaymentGatewayClient;
pub use error::PaymentGatewayError;
pub use types::{
    CreatePaymentLink, LinkCustomer, LinkNotify, PaymentLink, WebhookEvent, WebhookLinkEntity,
    WebhookPaymentEntity,
};

/// Header carrying the hex HMAC-SHA256 of the raw webhook body.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
