//! Follow-up reminders.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parley_core::{ContactId, ReminderId, ReminderStatus};

/// A dated follow-up, optionally tied to a contact.
#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub contact_id: Option<ContactId>,
    pub title: String,
    pub body: Option<String>,
    pub due_at: DateTime<Utc>,
    pub status: ReminderStatus,
    pub notify_contact: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
