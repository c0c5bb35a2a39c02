//! Quotation and order repositories.
//!
//! Quotations and orders share the same shape: a header row carrying the
//! total, and line rows carrying their own `line_total`. Headers and lines are
//! always written in one transaction so a stored total matches its lines.
//!
//! Document numbers are per tenant (`QT-0001`, `ORD-0001`). Allocation is
//! serialized per tenant with a transaction-scoped advisory lock.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};

use parley_core::{
    ContactId, Money, MoneyError, OrderId, OrderItemId, OrderStatus, PaymentState, ProductId,
    QuotationId, QuotationItemId, QuotationStatus, UserId,
};

use super::payments::PaymentRepository;
use super::{RepositoryError, money, quantity};
use crate::models::{
    LineItem, Order, OrderDetail, PaymentTarget, PricedLine, Quotation, QuotationDetail,
};

const QUOTATION_PREFIX: &str = "QT";
const ORDER_PREFIX: &str = "ORD";

// Second key of `pg_advisory_xact_lock(user_id, kind)`.
const QUOTATION_LOCK: i32 = 1;
const ORDER_LOCK: i32 = 2;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct QuotationRow {
    id: i32,
    contact_id: i32,
    number: String,
    status: QuotationStatus,
    payment_status: PaymentState,
    valid_until: Option<NaiveDate>,
    notes: Option<String>,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuotationRow> for Quotation {
    type Error = RepositoryError;

    fn try_from(row: QuotationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: QuotationId::new(row.id),
            contact_id: ContactId::new(row.contact_id),
            number: row.number,
            status: row.status,
            payment_status: row.payment_status,
            valid_until: row.valid_until,
            notes: row.notes,
            total: money(row.total, "quotation total")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    contact_id: i32,
    quotation_id: Option<i32>,
    number: String,
    status: OrderStatus,
    payment_status: PaymentState,
    notes: Option<String>,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            contact_id: ContactId::new(row.contact_id),
            quotation_id: row.quotation_id.map(QuotationId::new),
            number: row.number,
            status: row.status,
            payment_status: row.payment_status,
            notes: row.notes,
            total: money(row.total, "order total")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i32,
    product_id: Option<i32>,
    description: String,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl ItemRow {
    fn into_item<I>(self, id: fn(i32) -> I) -> Result<LineItem<I>, RepositoryError> {
        Ok(LineItem {
            id: id(self.id),
            product_id: self.product_id.map(ProductId::new),
            description: self.description,
            quantity: quantity(self.quantity)?,
            unit_price: money(self.unit_price, "unit_price")?,
            line_total: money(self.line_total, "line_total")?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderExportRow {
    #[sqlx(flatten)]
    order: OrderRow,
    contact_name: String,
    contact_phone: String,
}

const QUOTATION_COLUMNS: &str = "q.id, q.contact_id, q.number, q.status, q.payment_status, \
     q.valid_until, q.notes, q.total, q.created_at, q.updated_at";

const ORDER_COLUMNS: &str = "o.id, o.contact_id, o.quotation_id, o.number, o.status, \
     o.payment_status, o.notes, o.total, o.created_at, o.updated_at";

/// An order with the contact it belongs to, for exports.
#[derive(Debug, Clone)]
pub struct OrderWithContact {
    pub order: Order,
    pub contact_name: String,
    pub contact_phone: String,
}

/// Partial quotation update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct QuotationUpdate {
    pub status: Option<QuotationStatus>,
    pub notes: Option<String>,
    pub valid_until: Option<NaiveDate>,
}

/// Partial order update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
}

// =============================================================================
// Shared helpers
// =============================================================================

fn format_number(prefix: &str, sequence: i32) -> String {
    format!("{prefix}-{sequence:04}")
}

async fn next_number(
    conn: &mut PgConnection,
    table: &str,
    lock: i32,
    user_id: UserId,
    prefix: &str,
) -> Result<String, RepositoryError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(user_id)
        .bind(lock)
        .execute(&mut *conn)
        .await?;

    let sequence: i32 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(MAX(CAST(SUBSTRING(number FROM '[0-9]+$') AS INTEGER)), 0) + 1
         FROM parley.{table} WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_number(prefix, sequence))
}

async fn ensure_contact(
    conn: &mut PgConnection,
    user_id: UserId,
    contact_id: ContactId,
) -> Result<(), RepositoryError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM parley.contact WHERE user_id = $1 AND id = $2)",
    )
    .bind(user_id)
    .bind(contact_id)
    .fetch_one(&mut *conn)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(RepositoryError::NotFound)
    }
}

fn out_of_range(err: MoneyError) -> RepositoryError {
    RepositoryError::DataCorruption(format!("line amounts out of range: {err}"))
}

async fn insert_lines(
    conn: &mut PgConnection,
    table: &str,
    parent_column: &str,
    parent_id: i32,
    lines: &[PricedLine],
) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO parley.{table}
             ({parent_column}, product_id, description, quantity, unit_price, line_total)
         VALUES ($1, $2, $3, $4, $5, $6)"
    );

    for line in lines {
        let qty = i32::try_from(line.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("quantity {} out of range", line.quantity))
        })?;
        let line_total = line.line_total().map_err(out_of_range)?;

        sqlx::query(&sql)
            .bind(parent_id)
            .bind(line.product_id)
            .bind(&line.description)
            .bind(qty)
            .bind(line.unit_price)
            .bind(line_total)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepositoryError::from_write(e, "invalid line item"))?;
    }
    Ok(())
}

async fn fetch_lines<'c, E, I>(
    executor: E,
    table: &str,
    parent_column: &str,
    parent_id: i32,
    id: fn(i32) -> I,
) -> Result<Vec<LineItem<I>>, RepositoryError>
where
    E: PgExecutor<'c>,
{
    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT id, product_id, description, quantity, unit_price, line_total
         FROM parley.{table} WHERE {parent_column} = $1 ORDER BY id"
    ))
    .bind(parent_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(|row| row.into_item(id)).collect()
}

// =============================================================================
// Quotations
// =============================================================================

/// Repository for quotations.
pub struct QuotationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuotationRepository<'a> {
    /// Create a new quotation repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List quotations, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        status: Option<QuotationStatus>,
        contact_id: Option<ContactId>,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let rows = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM parley.quotation q
             WHERE q.user_id = $1
               AND ($2::parley.quotation_status IS NULL OR q.status = $2)
               AND ($3::int IS NULL OR q.contact_id = $3)
             ORDER BY q.created_at DESC, q.id DESC"
        ))
        .bind(user_id)
        .bind(status)
        .bind(contact_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a quotation header.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: QuotationId,
    ) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM parley.quotation q
             WHERE q.user_id = $1 AND q.id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a quotation with its lines and payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quotation does not exist for
    /// this tenant.
    pub async fn get_detail(
        &self,
        user_id: UserId,
        id: QuotationId,
    ) -> Result<QuotationDetail, RepositoryError> {
        let quotation = self.get(user_id, id).await?.ok_or(RepositoryError::NotFound)?;
        let items = fetch_lines(
            self.pool,
            "quotation_item",
            "quotation_id",
            id.as_i32(),
            QuotationItemId::new,
        )
        .await?;
        let payments = PaymentRepository::new(self.pool)
            .list_for_target(user_id, PaymentTarget::Quotation(id))
            .await?;

        Ok(QuotationDetail {
            quotation,
            items,
            payments,
        })
    }

    /// Create a quotation with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact does not belong to
    /// this tenant.
    pub async fn create(
        &self,
        user_id: UserId,
        contact_id: ContactId,
        lines: &[PricedLine],
        valid_until: Option<NaiveDate>,
        notes: Option<&str>,
    ) -> Result<QuotationDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        ensure_contact(&mut tx, user_id, contact_id).await?;
        let number = next_number(
            &mut tx,
            "quotation",
            QUOTATION_LOCK,
            user_id,
            QUOTATION_PREFIX,
        )
        .await?;

        let row = sqlx::query_as::<_, QuotationRow>(
            "INSERT INTO parley.quotation AS q
                 (user_id, contact_id, number, valid_until, notes, total)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING q.id, q.contact_id, q.number, q.status, q.payment_status,
                       q.valid_until, q.notes, q.total, q.created_at, q.updated_at",
        )
        .bind(user_id)
        .bind(contact_id)
        .bind(&number)
        .bind(valid_until)
        .bind(notes)
        .bind(PricedLine::total(lines).map_err(out_of_range)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "quotation number already taken"))?;

        insert_lines(&mut tx, "quotation_item", "quotation_id", row.id, lines).await?;
        let items = fetch_lines(
            &mut *tx,
            "quotation_item",
            "quotation_id",
            row.id,
            QuotationItemId::new,
        )
        .await?;

        tx.commit().await?;

        Ok(QuotationDetail {
            quotation: row.try_into()?,
            items,
            payments: Vec::new(),
        })
    }

    /// Update status, notes or validity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quotation does not exist for
    /// this tenant.
    pub async fn update(
        &self,
        user_id: UserId,
        id: QuotationId,
        update: &QuotationUpdate,
    ) -> Result<Quotation, RepositoryError> {
        let row = sqlx::query_as::<_, QuotationRow>(
            "UPDATE parley.quotation AS q
             SET status = COALESCE($3, q.status),
                 notes = COALESCE($4, q.notes),
                 valid_until = COALESCE($5, q.valid_until)
             WHERE q.user_id = $1 AND q.id = $2
             RETURNING q.id, q.contact_id, q.number, q.status, q.payment_status,
                       q.valid_until, q.notes, q.total, q.created_at, q.updated_at",
        )
        .bind(user_id)
        .bind(id)
        .bind(update.status)
        .bind(update.notes.as_deref())
        .bind(update.valid_until)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Store a recomputed settlement state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quotation does not exist for
    /// this tenant.
    pub async fn set_payment_status(
        &self,
        user_id: UserId,
        id: QuotationId,
        state: PaymentState,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE parley.quotation SET payment_status = $3 WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(id)
        .bind(state)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a quotation with its lines and payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quotation does not exist for
    /// this tenant.
    pub async fn delete(&self, user_id: UserId, id: QuotationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM parley.quotation WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Turn a quotation into an order.
    ///
    /// The order copies the quotation's contact, lines and total, and the
    /// quotation becomes `accepted`. A quotation converts at most once, and
    /// rejected or expired quotations do not convert.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quotation does not exist for
    /// this tenant, `RepositoryError::Conflict` if it cannot be converted.
    pub async fn convert_to_order(
        &self,
        user_id: UserId,
        id: QuotationId,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let quotation: Quotation = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM parley.quotation q
             WHERE q.user_id = $1 AND q.id = $2
             FOR UPDATE"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()?;

        if matches!(
            quotation.status,
            QuotationStatus::Rejected | QuotationStatus::Expired
        ) {
            return Err(RepositoryError::Conflict(format!(
                "a {} quotation cannot be converted",
                quotation.status
            )));
        }

        let converted: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM parley.sales_order WHERE user_id = $1 AND quotation_id = $2)",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if converted {
            return Err(RepositoryError::Conflict(
                "quotation already converted to an order".to_owned(),
            ));
        }

        let lines: Vec<PricedLine> = fetch_lines(
            &mut *tx,
            "quotation_item",
            "quotation_id",
            id.as_i32(),
            QuotationItemId::new,
        )
        .await?
        .iter()
        .map(PricedLine::from)
        .collect();

        let order = insert_order(
            &mut tx,
            user_id,
            quotation.contact_id,
            Some(id),
            &lines,
            quotation.notes.as_deref(),
        )
        .await?;

        sqlx::query("UPDATE parley.quotation SET status = $3 WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .bind(QuotationStatus::Accepted)
            .execute(&mut *tx)
            .await?;

        let items = fetch_lines(
            &mut *tx,
            "order_item",
            "order_id",
            order.id.as_i32(),
            OrderItemId::new,
        )
        .await?;

        tx.commit().await?;

        Ok(OrderDetail {
            order,
            items,
            payments: Vec::new(),
        })
    }
}

// =============================================================================
// Orders
// =============================================================================

async fn insert_order(
    conn: &mut PgConnection,
    user_id: UserId,
    contact_id: ContactId,
    quotation_id: Option<QuotationId>,
    lines: &[PricedLine],
    notes: Option<&str>,
) -> Result<Order, RepositoryError> {
    let number = next_number(conn, "sales_order", ORDER_LOCK, user_id, ORDER_PREFIX).await?;
    let total: Money = PricedLine::total(lines).map_err(out_of_range)?;

    let row = sqlx::query_as::<_, OrderRow>(
        "INSERT INTO parley.sales_order AS o
             (user_id, contact_id, quotation_id, number, notes, total)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING o.id, o.contact_id, o.quotation_id, o.number, o.status,
                   o.payment_status, o.notes, o.total, o.created_at, o.updated_at",
    )
    .bind(user_id)
    .bind(contact_id)
    .bind(quotation_id)
    .bind(&number)
    .bind(notes)
    .bind(total)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::from_write(e, "order number already taken"))?;

    insert_lines(conn, "order_item", "order_id", row.id, lines).await?;
    row.try_into()
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        contact_id: Option<ContactId>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM parley.sales_order o
             WHERE o.user_id = $1
               AND ($2::parley.order_status IS NULL OR o.status = $2)
               AND ($3::int IS NULL OR o.contact_id = $3)
             ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(user_id)
        .bind(status)
        .bind(contact_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every order with its contact, oldest first (for exports).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_contacts(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderWithContact>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderExportRow>(&format!(
            "SELECT {ORDER_COLUMNS}, c.name AS contact_name, c.phone AS contact_phone
             FROM parley.sales_order o
             JOIN parley.contact c ON c.id = o.contact_id
             WHERE o.user_id = $1
             ORDER BY o.id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderWithContact {
                    order: row.order.try_into()?,
                    contact_name: row.contact_name,
                    contact_phone: row.contact_phone,
                })
            })
            .collect()
    }

    /// Get an order header.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM parley.sales_order o WHERE o.user_id = $1 AND o.id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an order with its lines and payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist for this
    /// tenant.
    pub async fn get_detail(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<OrderDetail, RepositoryError> {
        let order = self.get(user_id, id).await?.ok_or(RepositoryError::NotFound)?;
        let items = fetch_lines(
            self.pool,
            "order_item",
            "order_id",
            id.as_i32(),
            OrderItemId::new,
        )
        .await?;
        let payments = PaymentRepository::new(self.pool)
            .list_for_target(user_id, PaymentTarget::Order(id))
            .await?;

        Ok(OrderDetail {
            order,
            items,
            payments,
        })
    }

    /// Create an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact does not belong to
    /// this tenant.
    pub async fn create(
        &self,
        user_id: UserId,
        contact_id: ContactId,
        lines: &[PricedLine],
        notes: Option<&str>,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        ensure_contact(&mut tx, user_id, contact_id).await?;
        let order = insert_order(&mut tx, user_id, contact_id, None, lines, notes).await?;
        let items = fetch_lines(
            &mut *tx,
            "order_item",
            "order_id",
            order.id.as_i32(),
            OrderItemId::new,
        )
        .await?;

        tx.commit().await?;

        Ok(OrderDetail {
            order,
            items,
            payments: Vec::new(),
        })
    }

    /// Update status or notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist for this
    /// tenant.
    pub async fn update(
        &self,
        user_id: UserId,
        id: OrderId,
        update: &OrderUpdate,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "UPDATE parley.sales_order AS o
             SET status = COALESCE($3, o.status),
                 notes = COALESCE($4, o.notes)
             WHERE o.user_id = $1 AND o.id = $2
             RETURNING o.id, o.contact_id, o.quotation_id, o.number, o.status,
                       o.payment_status, o.notes, o.total, o.created_at, o.updated_at",
        )
        .bind(user_id)
        .bind(id)
        .bind(update.status)
        .bind(update.notes.as_deref())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Store a recomputed settlement state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist for this
    /// tenant.
    pub async fn set_payment_status(
        &self,
        user_id: UserId,
        id: OrderId,
        state: PaymentState,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE parley.sales_order SET payment_status = $3 WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(id)
        .bind(state)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete an order with its lines and payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist for this
    /// tenant.
    pub async fn delete(&self, user_id: UserId, id: OrderId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM parley.sales_order WHERE user_id = $1 AND id = $2")
                .bind(user_id)
                .bind(id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
