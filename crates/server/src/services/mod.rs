//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Tenant registration and password login
//! - `messaging` - Outbound WhatsApp sends with pending/sent/failed tracking
//! - `inbound` - WhatsApp webhook reconciliation (statuses, messages, contacts)
//! - `payments` - Payment links, manual payments and settlement
//! - `broadcasts` - Background bulk sends
//! - `reminders` - Due-reminder sweeper
//! - `sales` - Line-item pricing for quotations and orders
//! - `export` - CSV rendering

pub mod auth;
pub mod broadcasts;
pub mod export;
pub mod inbound;
pub mod messaging;
pub mod payments;
pub mod reminders;
pub mod sales;

pub use auth::{AuthError, AuthService};
pub use broadcasts::{Audience, BroadcastService};
pub use inbound::{InboundOutcome, InboundService};
pub use messaging::MessagingService;
pub use payments::{PaymentService, WebhookOutcome};
