//! Quotations, orders and their line items.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use parley_core::{
    ContactId, Money, MoneyError, OrderId, OrderItemId, OrderStatus, PaymentState, ProductId, QuotationId,
    QuotationItemId, QuotationStatus,
};

use super::payment::Payment;

/// A priced line on a quotation or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem<I> {
    pub id: I,
    pub product_id: Option<ProductId>,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

pub type QuotationItem = LineItem<QuotationItemId>;
pub type OrderItem = LineItem<OrderItemId>;

/// A line as submitted by the client.
///
/// When `product_id` is set, a missing description or unit price is taken
/// from the product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLineItem {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<Money>,
}

/// A validated line ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Option<ProductId>,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl PricedLine {
    /// `quantity × unit_price`.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` when the product exceeds `Money::MAX`.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.unit_price.times(self.quantity)
    }

    /// Sum of all line totals.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` when a line or the running total
    /// exceeds `Money::MAX`.
    pub fn total(lines: &[Self]) -> Result<Money, MoneyError> {
        lines
            .iter()
            .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.line_total()?))
    }
}

impl<I> From<&LineItem<I>> for PricedLine {
    fn from(item: &LineItem<I>) -> Self {
        Self {
            product_id: item.product_id,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// A price offer sent to a contact.
#[derive(Debug, Clone, Serialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub contact_id: ContactId,
    pub number: String,
    pub status: QuotationStatus,
    pub payment_status: PaymentState,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A quotation with its lines and payments.
#[derive(Debug, Clone, Serialize)]
pub struct QuotationDetail {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub items: Vec<QuotationItem>,
    pub payments: Vec<Payment>,
}

/// A confirmed sale.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub contact_id: ContactId,
    pub quotation_id: Option<QuotationId>,
    pub number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentState,
    pub notes: Option<String>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order with its lines and payments.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

impl OrderDetail {
    /// Total minus everything already paid.
    #[must_use]
    pub fn outstanding(&self) -> Money {
        self.order.total.saturating_sub(Payment::paid_sum(&self.payments))
    }
}

impl QuotationDetail {
    /// Total minus everything already paid.
    #[must_use]
    pub fn outstanding(&self) -> Money {
        self.quotation
            .total
            .saturating_sub(Payment::paid_sum(&self.payments))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(qty: u32, price: &str) -> PricedLine {
        PricedLine {
            product_id: None,
            description: "Widget".to_string(),
            quantity: qty,
            unit_price: Money::new(price.parse().unwrap()).unwrap(),
        }
    }

    #[test]
    fn test_total_is_sum_of_lines() {
        let lines = vec![line(3, "2.50"), line(1, "10.00"), line(2, "0.99")];
        assert_eq!(PricedLine::total(&lines).unwrap().to_string(), "19.48");
        assert_eq!(PricedLine::total(&[]).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_total_past_column_range_is_an_error() {
        let big = line(100_000, "9999999999.99");
        assert_eq!(big.line_total(), Err(MoneyError::Overflow));

        let half = line(1, "5000000000.00");
        assert_eq!(
            PricedLine::total(&[half.clone(), half.clone(), half]),
            Err(MoneyError::Overflow)
        );
    }
}
