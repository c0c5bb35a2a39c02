//! Status enums for CRM entities.
//!
//! With the `postgres` feature each enum maps onto a Postgres enum type of the
//! same snake-case name in the `parley` schema (see the server migrations).

use serde::{Deserialize, Serialize};

use super::money::Money;

/// Generates `as_str`, `Display` and `FromStr` for a snake-case status enum.
macro_rules! status_strings {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// The wire/database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Direction of a chat message relative to the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.message_direction", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

status_strings!(MessageDirection {
    Inbound => "inbound",
    Outbound => "outbound",
});

/// Content kind of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.message_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Document,
}

status_strings!(MessageKind {
    Text => "text",
    Image => "image",
    Document => "document",
});

/// Delivery status of a chat message.
///
/// Outbound messages move `pending → sent → delivered → read`, or to `failed`.
/// Inbound messages are stored as `received`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.message_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Received,
}

status_strings!(MessageStatus {
    Pending => "pending",
    Sent => "sent",
    Delivered => "delivered",
    Read => "read",
    Failed => "failed",
    Received => "received",
});

impl MessageStatus {
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
            Self::Failed | Self::Received => 4,
        }
    }

    /// Whether a provider status callback may move a message from `self` to
    /// `next`.
    ///
    /// Callbacks can arrive out of order, so the status only moves forward.
    /// `failed` always applies to an outbound message, even one already
    /// `read` or `failed`. `received` rows are never touched by callbacks.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Received, _) | (_, Self::Received | Self::Pending) => false,
            (_, Self::Failed) => true,
            (Self::Failed, _) => false,
            _ => next.rank() > self.rank(),
        }
    }

    /// Map a WhatsApp webhook status string.
    #[must_use]
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Quotation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.quotation_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

status_strings!(QuotationStatus {
    Draft => "draft",
    Sent => "sent",
    Accepted => "accepted",
    Rejected => "rejected",
    Expired => "expired",
});

/// Order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

status_strings!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Orders still being worked on.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Shipped)
    }
}

/// Settlement state of an order or quotation, derived from its payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.payment_state", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Unpaid,
    PartiallyPaid,
    Paid,
}

status_strings!(PaymentState {
    Unpaid => "unpaid",
    PartiallyPaid => "partially_paid",
    Paid => "paid",
});

impl PaymentState {
    /// Derive the settlement state from a target total and the amounts of
    /// its payments that have status `paid`.
    ///
    /// ```
    /// use parley_core::{Money, PaymentState};
    ///
    /// let total = Money::from_minor_units(10_000).unwrap();
    /// let half = Money::from_minor_units(5_000).unwrap();
    /// assert_eq!(PaymentState::settle(total, [half]), PaymentState::PartiallyPaid);
    /// assert_eq!(PaymentState::settle(total, [half, half]), PaymentState::Paid);
    /// assert_eq!(PaymentState::settle(total, Vec::new()), PaymentState::Unpaid);
    /// ```
    #[must_use]
    pub fn settle(total: Money, paid: impl IntoIterator<Item = Money>) -> Self {
        match Money::try_sum(paid) {
            Ok(paid) if paid.is_zero() => Self::Unpaid,
            Ok(paid) if paid < total => Self::PartiallyPaid,
            Ok(_) | Err(_) => Self::Paid,
        }
    }
}

/// Status of a single payment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Cancelled,
}

status_strings!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// Broadcast campaign lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.broadcast_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    #[default]
    Draft,
    Sending,
    Completed,
    Failed,
}

status_strings!(BroadcastStatus {
    Draft => "draft",
    Sending => "sending",
    Completed => "completed",
    Failed => "failed",
});

/// Per-recipient delivery state of a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.recipient_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

status_strings!(RecipientStatus {
    Pending => "pending",
    Sent => "sent",
    Failed => "failed",
});

/// Reminder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parley.reminder_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    #[default]
    Pending,
    Sent,
    Done,
    Cancelled,
}

status_strings!(ReminderStatus {
    Pending => "pending",
    Sent => "sent",
    Done => "done",
    Cancelled => "cancelled",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn money(minor: u64) -> Money {
        Money::from_minor_units(minor).unwrap()
    }

    #[test]
    fn test_settle_exact_total_is_paid() {
        assert_eq!(
            PaymentState::settle(money(2500), [money(1000), money(1500)]),
            PaymentState::Paid
        );
    }

    #[test]
    fn test_settle_overpayment_is_paid() {
        assert_eq!(
            PaymentState::settle(money(2500), [money(3000)]),
            PaymentState::Paid
        );
    }

    #[test]
    fn test_settle_partial() {
        assert_eq!(
            PaymentState::settle(money(2500), [money(2499)]),
            PaymentState::PartiallyPaid
        );
    }

    #[test]
    fn test_settle_sum_past_bound_is_paid() {
        assert_eq!(
            PaymentState::settle(Money::MAX, [Money::MAX, money(100)]),
            PaymentState::Paid
        );
    }

    #[test]
    fn test_settle_zero_total_without_payments_is_unpaid() {
        assert_eq!(
            PaymentState::settle(Money::ZERO, Vec::new()),
            PaymentState::Unpaid
        );
    }

    #[test]
    fn test_message_status_moves_forward_only() {
        assert!(MessageStatus::Pending.can_advance_to(MessageStatus::Sent));
        assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Read));
        assert!(!MessageStatus::Read.can_advance_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Delivered.can_advance_to(MessageStatus::Sent));
    }

    #[test]
    fn test_message_status_failed_handling() {
        assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Failed));
        assert!(MessageStatus::Delivered.can_advance_to(MessageStatus::Failed));
        assert!(MessageStatus::Pending.can_advance_to(MessageStatus::Failed));
        assert!(MessageStatus::Read.can_advance_to(MessageStatus::Failed));
        assert!(MessageStatus::Failed.can_advance_to(MessageStatus::Failed));
        assert!(!MessageStatus::Failed.can_advance_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Failed.can_advance_to(MessageStatus::Read));
        assert!(!MessageStatus::Received.can_advance_to(MessageStatus::Failed));
    }

    #[test]
    fn test_received_is_immutable() {
        assert!(!MessageStatus::Received.can_advance_to(MessageStatus::Read));
        assert!(!MessageStatus::Pending.can_advance_to(MessageStatus::Received));
    }

    #[test]
    fn test_from_provider() {
        assert_eq!(
            MessageStatus::from_provider("delivered"),
            Some(MessageStatus::Delivered)
        );
        assert_eq!(MessageStatus::from_provider("deleted"), None);
    }

    #[test]
    fn test_status_strings_roundtrip_through_from_str() {
        assert_eq!(
            "partially_paid".parse::<PaymentState>().unwrap(),
            PaymentState::PartiallyPaid
        );
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
        assert!("shipped!".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&PaymentState::PartiallyPaid).unwrap();
        assert_eq!(json, "\"partially_paid\"");
    }

    #[test]
    fn test_open_orders() {
        assert!(OrderStatus::Shipped.is_open());
        assert!(!OrderStatus::Delivered.is_open());
        assert!(!OrderStatus::Cancelled.is_open());
    }
}
