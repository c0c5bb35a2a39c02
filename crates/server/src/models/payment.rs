//! Payments against orders and quotations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parley_core::{Money, OrderId, PaymentId, PaymentStatus, QuotationId};

/// What a payment settles. Exactly one target per payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum PaymentTarget {
    Order(OrderId),
    Quotation(QuotationId),
}

impl PaymentTarget {
    /// Build from the optional id pair used in requests and rows.
    ///
    /// Returns `None` unless exactly one id is set.
    #[must_use]
    pub const fn from_ids(order_id: Option<OrderId>, quotation_id: Option<QuotationId>) -> Option<Self> {
        match (order_id, quotation_id) {
            (Some(id), None) => Some(Self::Order(id)),
            (None, Some(id)) => Some(Self::Quotation(id)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn order_id(self) -> Option<OrderId> {
        match self {
            Self::Order(id) => Some(id),
            Self::Quotation(_) => None,
        }
    }

    #[must_use]
    pub const fn quotation_id(self) -> Option<QuotationId> {
        match self {
            Self::Quotation(id) => Some(id),
            Self::Order(_) => None,
        }
    }
}

/// One payment row.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub target: PaymentTarget,
    pub amount: Money,
    pub status: PaymentStatus,
    pub method: String,
    pub gateway_link_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub link_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Method recorded for gateway payment links.
    pub const METHOD_LINK: &'static str = "payment_link";

    /// Amounts of the `paid` payments in a list.
    pub fn paid_amounts(payments: &[Self]) -> impl Iterator<Item = Money> + '_ {
        payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .map(|p| p.amount)
    }

    /// Sum of the `paid` payments in a list, saturating at `Money::MAX`.
    #[must_use]
    pub fn paid_sum(payments: &[Self]) -> Money {
        Money::try_sum(Self::paid_amounts(payments)).unwrap_or(Money::MAX)
    }
}
