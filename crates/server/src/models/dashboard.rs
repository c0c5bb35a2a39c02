//! Dashboard summary.

use serde::Serialize;

use parley_core::Money;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub contacts: i64,
    pub open_orders: i64,
    /// Sum of all `paid` payments.
    pub revenue: Money,
    /// Inbound messages received in the last 24 hours (no read receipts are
    /// kept for inbound messages).
    pub unread_messages: i64,
}
