//! Database operations for the CRM.
//!
//! # Schema: `parley`
//!
//! ## Tables
//!
//! - `app_user` - Tenant accounts
//! - `settings` - Per-tenant WhatsApp credentials and business details
//! - `contact`, `tag`, `contact_tag` - Customers and their labels
//! - `product` - Catalogue
//! - `quotation`, `quotation_item`, `sales_order`, `order_item` - Sales documents
//! - `payment` - Payments against an order or a quotation
//! - `message` - WhatsApp chat history
//! - `broadcast`, `broadcast_recipient` - Bulk sends
//! - `reminder` - Follow-ups
//! - `session` - tower-sessions store
//!
//! Every repository method that touches tenant data takes the owning
//! [`UserId`](parley_core::UserId) and filters on it, so a row belonging to
//! another tenant behaves exactly like a missing row.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p parley-cli -- migrate
//! ```

pub mod broadcasts;
pub mod contacts;
pub mod dashboard;
pub mod messages;
pub mod payments;
pub mod products;
pub mod reminders;
pub mod sales;
pub mod settings;
pub mod users;

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use parley_core::Money;

pub use broadcasts::BroadcastRepository;
pub use contacts::{ContactRepository, TagRepository};
pub use dashboard::DashboardRepository;
pub use messages::MessageRepository;
pub use payments::PaymentRepository;
pub use products::ProductRepository;
pub use reminders::ReminderRepository;
pub use sales::{OrderRepository, QuotationRepository};
pub use settings::SettingsRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate phone number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to `Conflict`, everything else to
    /// `Database`.
    pub(crate) fn from_write(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(conflict.to_owned());
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict("referenced record does not exist".to_owned());
            }
        }
        Self::Database(err)
    }
}

/// Convert a stored `NUMERIC` into [`Money`].
pub(crate) fn money(value: Decimal, column: &str) -> Result<Money, RepositoryError> {
    Money::new(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}")))
}

/// Convert a stored `INTEGER` quantity into `u32`.
pub(crate) fn quantity(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative quantity {value}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
