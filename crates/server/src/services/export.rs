//! CSV exports.
//!
//! Output follows RFC 4180: CRLF line endings, and fields containing a comma,
//! quote, CR or LF are wrapped in quotes with inner quotes doubled.

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::db::sales::OrderWithContact;
use crate::models::Contact;

/// Column headers of the contacts export.
pub const CONTACT_HEADERS: &[&str] = &[
    "id",
    "name",
    "phone",
    "email",
    "notes",
    "last_message_at",
    "created_at",
];

/// Column headers of the orders export.
pub const ORDER_HEADERS: &[&str] = &[
    "number",
    "contact_name",
    "contact_phone",
    "status",
    "payment_status",
    "total",
    "created_at",
];

/// Quote one field if needed.
#[must_use]
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Accumulates CSV rows in memory.
#[derive(Debug, Default)]
pub struct CsvWriter {
    buf: String,
}

impl CsvWriter {
    /// Start a document with a header row.
    #[must_use]
    pub fn with_headers(headers: &[&str]) -> Self {
        let mut writer = Self::default();
        writer.row(headers.iter().copied());
        writer
    }

    /// Append one record.
    pub fn row<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
            }
            self.buf.push_str(&escape_field(field));
        }
        self.buf.push_str("\r\n");
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.buf
    }
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339()).unwrap_or_default()
}

/// Render contacts as CSV.
#[must_use]
pub fn contacts_csv(contacts: &[Contact]) -> String {
    let mut csv = CsvWriter::with_headers(CONTACT_HEADERS);
    for contact in contacts {
        let id = contact.id.to_string();
        let last = timestamp(contact.last_message_at);
        let created = timestamp(Some(contact.created_at));
        csv.row([
            id.as_str(),
            contact.name.as_str(),
            contact.phone.as_str(),
            contact.email.as_ref().map_or("", |e| e.as_str()),
            contact.notes.as_deref().unwrap_or(""),
            last.as_str(),
            created.as_str(),
        ]);
    }
    csv.finish()
}

/// Render orders with their contacts as CSV.
#[must_use]
pub fn orders_csv(orders: &[OrderWithContact]) -> String {
    let mut csv = CsvWriter::with_headers(ORDER_HEADERS);
    for row in orders {
        let total = row.order.total.to_string();
        let created = timestamp(Some(row.order.created_at));
        csv.row([
            row.order.number.as_str(),
            row.contact_name.as_str(),
            row.contact_phone.as_str(),
            row.order.status.as_str(),
            row.order.payment_status.as_str(),
            total.as_str(),
            created.as_str(),
        ]);
    }
    csv.finish()
}
