//! Payment repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use parley_core::{Money, OrderId, PaymentId, PaymentStatus, QuotationId, UserId};

use super::{RepositoryError, money};
use crate::models::{Payment, PaymentTarget};

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    order_id: Option<i32>,
    quotation_id: Option<i32>,
    amount: Decimal,
    status: PaymentStatus,
    method: String,
    gateway_link_id: Option<String>,
    gateway_payment_id: Option<String>,
    link_url: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let target = PaymentTarget::from_ids(
            row.order_id.map(OrderId::new),
            row.quotation_id.map(QuotationId::new),
        )
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!("payment {} has no single target", row.id))
        })?;

        Ok(Self {
            id: PaymentId::new(row.id),
            target,
            amount: money(row.amount, "payment amount")?,
            status: row.status,
            method: row.method,
            gateway_link_id: row.gateway_link_id,
            gateway_payment_id: row.gateway_payment_id,
            link_url: row.link_url,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, order_id, quotation_id, amount, status, method, \
     gateway_link_id, gateway_payment_id, link_url, paid_at, created_at, updated_at";

/// Repository for payments.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Payments of one order or quotation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_target(
        &self,
        user_id: UserId,
        target: PaymentTarget,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM parley.payment
             WHERE user_id = $1
               AND order_id IS NOT DISTINCT FROM $2
               AND quotation_id IS NOT DISTINCT FROM $3
             ORDER BY created_at, id"
        ))
        .bind(user_id)
        .bind(target.order_id())
        .bind(target.quotation_id())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: PaymentId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM parley.payment WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert a payment against a target owned by this tenant.
    ///
    /// `paid` payments are stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the target does not belong to
    /// this tenant.
    pub async fn create(
        &self,
        user_id: UserId,
        target: PaymentTarget,
        amount: Money,
        status: PaymentStatus,
        method: &str,
    ) -> Result<Payment, RepositoryError> {
        let paid_at = (status == PaymentStatus::Paid).then(Utc::now);

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "INSERT INTO parley.payment
                 (user_id, order_id, quotation_id, amount, status, method, paid_at)
             SELECT $1, $2, $3, $4, $5, $6, $7
             WHERE EXISTS (SELECT 1 FROM parley.sales_order WHERE user_id = $1 AND id = $2)
                OR EXISTS (SELECT 1 FROM parley.quotation WHERE user_id = $1 AND id = $3)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(target.order_id())
        .bind(target.quotation_id())
        .bind(amount)
        .bind(status)
        .bind(method)
        .bind(paid_at)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Attach a gateway payment link to a pending payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist for
    /// this tenant.
    pub async fn set_link(
        &self,
        user_id: UserId,
        id: PaymentId,
        link_id: &str,
        link_url: &str,
    ) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE parley.payment SET gateway_link_id = $3, link_url = $4
             WHERE user_id = $1 AND id = $2
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(link_id)
        .bind(link_url)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "payment link already recorded"))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Mark a payment as paid.
    ///
    /// Returns the payment and whether this call changed it. Marking an
    /// already paid payment again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist for
    /// this tenant.
    pub async fn mark_paid(
        &self,
        user_id: UserId,
        id: PaymentId,
        gateway_payment_id: Option<&str>,
    ) -> Result<(Payment, bool), RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE parley.payment
             SET status = 'paid', paid_at = NOW(),
                 gateway_payment_id = COALESCE($3, gateway_payment_id)
             WHERE user_id = $1 AND id = $2 AND status <> 'paid'
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(gateway_payment_id)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = row {
            return Ok((row.try_into()?, true));
        }

        let existing = self.get(user_id, id).await?.ok_or(RepositoryError::NotFound)?;
        Ok((existing, false))
    }

    /// Close a pending payment as `cancelled` or `failed`.
    ///
    /// Returns `None` if the payment exists but is no longer pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment does not exist for
    /// this tenant.
    pub async fn close_pending(
        &self,
        user_id: UserId,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE parley.payment SET status = $3
             WHERE user_id = $1 AND id = $2 AND status = 'pending'
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_into()?)),
            None => {
                self.get(user_id, id).await?.ok_or(RepositoryError::NotFound)?;
                Ok(None)
            }
        }
    }
}
