//! Contacts and tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::{ContactId, Email, PhoneNumber, TagId};

/// A customer of one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: ContactId,
    pub phone: PhoneNumber,
    pub name: String,
    pub email: Option<Email>,
    pub notes: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A contact with its tags.
#[derive(Debug, Clone, Serialize)]
pub struct ContactDetail {
    #[serde(flatten)]
    pub contact: Contact,
    pub tags: Vec<Tag>,
}

/// A tenant-defined label for grouping contacts.
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: String,
}

/// List filter for contacts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilter {
    /// Case-insensitive match on name, phone or email.
    pub q: Option<String>,
    pub tag_id: Option<TagId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ContactFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    /// Page size clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Non-negative offset.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// `ILIKE` pattern for the search term, with wildcards escaped.
    #[must_use]
    pub fn pattern(&self) -> Option<String> {
        let q = self.q.as_deref()?.trim();
        if q.is_empty() {
            return None;
        }
        let escaped = q
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{escaped}%"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_paging_clamps() {
        let filter = ContactFilter {
            limit: Some(10_000),
            offset: Some(-5),
            ..ContactFilter::default()
        };
        assert_eq!(filter.limit(), ContactFilter::MAX_LIMIT);
        assert_eq!(filter.offset(), 0);
        assert_eq!(ContactFilter::default().limit(), 50);
    }

    #[test]
    fn test_filter_pattern_escapes_wildcards() {
        let filter = ContactFilter {
            q: Some(" 50%_off ".to_string()),
            ..ContactFilter::default()
        };
        assert_eq!(filter.pattern().as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(ContactFilter::default().pattern(), None);
    }
}
