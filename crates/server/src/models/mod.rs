//! Domain models for the CRM.
//!
//! Models are what repositories return and what the JSON API serializes.
//! Every model belongs to exactly one tenant; the owning `user_id` is kept out
//! of API responses because a session can only ever see its own rows.

pub mod broadcast;
pub mod contact;
pub mod dashboard;
pub mod message;
pub mod payment;
pub mod product;
pub mod reminder;
pub mod sales;
pub mod session;
pub mod settings;
pub mod user;

pub use broadcast::{Broadcast, BroadcastRecipient};
pub use contact::{Contact, ContactDetail, ContactFilter, Tag};
pub use dashboard::DashboardStats;
pub use message::{Message, NewMessage};
pub use payment::{Payment, PaymentTarget};
pub use product::Product;
pub use reminder::Reminder;
pub use sales::{
    LineItem, NewLineItem, Order, OrderDetail, OrderItem, PricedLine, Quotation, QuotationDetail,
    QuotationItem,
};
pub use session::{CurrentTenant, keys as session_keys};
pub use settings::{Settings, SettingsView};
pub use user::User;
