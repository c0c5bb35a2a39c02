//! Dashboard aggregates.

use rust_decimal::Decimal;
use sqlx::PgPool;

use parley_core::UserId;

use super::{RepositoryError, money};
use crate::models::DashboardStats;

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    contacts: i64,
    open_orders: i64,
    revenue: Decimal,
    unread_messages: i64,
}

/// Read-only summary queries.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    /// Create a new dashboard repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Headline counts for one tenant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self, user_id: UserId) -> Result<DashboardStats, RepositoryError> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT
                 (SELECT COUNT(*) FROM parley.contact WHERE user_id = $1) AS contacts,
                 (SELECT COUNT(*) FROM parley.sales_order
                  WHERE user_id = $1 AND status IN ('pending', 'confirmed', 'shipped')) AS open_orders,
                 (SELECT COALESCE(SUM(amount), 0) FROM parley.payment
                  WHERE user_id = $1 AND status = 'paid') AS revenue,
                 (SELECT COUNT(*) FROM parley.message
                  WHERE user_id = $1 AND direction = 'inbound'
                    AND created_at > NOW() - INTERVAL '24 hours') AS unread_messages",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(DashboardStats {
            contacts: row.contacts,
            open_orders: row.open_orders,
            revenue: money(row.revenue, "revenue")?,
            unread_messages: row.unread_messages,
        })
    }
}
