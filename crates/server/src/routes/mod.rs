//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database ping)
//!
//! # Auth
//! POST /api/auth/register               - Create a tenant and log in
//! POST /api/auth/login                  - Password login
//! POST /api/auth/logout                 - Logout
//! GET  /api/auth/me                     - Current tenant
//!
//! # Settings
//! GET  /api/settings                    - Tenant settings (token redacted)
//! PUT  /api/settings                    - Replace settings
//!
//! # Contacts, tags, messages
//! GET  /api/contacts                    - List (q, tag_id, limit, offset)
//! POST /api/contacts                    - Create
//! GET  /api/contacts/{id}               - Detail with tags
//! PUT  /api/contacts/{id}               - Update
//! DELETE /api/contacts/{id}             - Delete
//! POST /api/contacts/{id}/tags/{tag_id} - Attach tag
//! DELETE /api/contacts/{id}/tags/{tag_id} - Detach tag
//! GET  /api/contacts/{id}/messages      - Conversation, oldest first
//! POST /api/contacts/{id}/messages      - Send a WhatsApp message
//! GET|POST /api/tags, PUT|DELETE /api/tags/{id}
//!
//! # Catalog and sales
//! GET|POST /api/products, GET|PUT|DELETE /api/products/{id}
//! GET|POST /api/quotations, GET|PUT|DELETE /api/quotations/{id}
//! POST /api/quotations/{id}/convert     - Convert to an order
//! GET|POST /api/orders, GET|PUT|DELETE /api/orders/{id}
//!
//! # Payments
//! POST /api/payments/links              - Create a gateway payment link
//! POST /api/payments                    - Record a manual payment
//! POST /api/payments/{id}/cancel        - Cancel a pending payment
//!
//! # Outreach
//! GET|POST /api/broadcasts, GET|PUT|DELETE /api/broadcasts/{id}
//! POST /api/broadcasts/{id}/send        - Start sending (202)
//! GET|POST /api/reminders, GET|PUT|DELETE /api/reminders/{id}
//!
//! # Reporting
//! GET  /api/dashboard/stats
//! GET  /api/export/contacts.csv
//! GET  /api/export/orders.csv
//!
//! # Webhooks (no session)
//! GET  /api/webhooks/whatsapp           - Verification handshake
//! POST /api/webhooks/whatsapp           - Messages and status callbacks
//! POST /api/webhooks/payments           - Payment gateway events
//!
//! # Realtime
//! GET  /api/events                      - Server-Sent Events for the tenant
//! POST /api/relay/emit                  - Server-to-server publish
//! ```

pub mod auth;
pub mod broadcasts;
pub mod contacts;
pub mod dashboard;
pub mod events;
pub mod export;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod quotations;
pub mod reminders;
pub mod settings;
pub mod tags;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the complete router (without state or layers).
pub fn routes() -> Router<AppState> {
    Router::new().merge(health::router()).nest("/api", api_routes())
}

/// Everything under `/api`.
fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(settings::router())
        .merge(contacts::router())
        .merge(tags::router())
        .merge(products::router())
        .merge(quotations::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(broadcasts::router())
        .merge(reminders::router())
        .merge(dashboard::router())
        .merge(export::router())
        .merge(webhooks::router())
        .merge(events::router())
}

/// Trim a required name-like field.
///
/// # Errors
///
/// Returns `AppError::BadRequest` naming `field` when the value is blank.
pub(crate) fn required(field: &str, value: &str) -> Result<String, crate::error::AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::AppError::BadRequest(format!(
            "{field} must not be empty"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional text field, treating blank as absent.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Asha ").ok().as_deref(), Some("Asha"));
        assert!(required("name", "   ").is_err());
    }

    #[test]
    fn test_optional_drops_blank() {
        assert_eq!(optional(Some(" note ".to_string())).as_deref(), Some("note"));
        assert_eq!(optional(Some("  ".to_string())), None);
        assert_eq!(optional(None), None);
    }
}
