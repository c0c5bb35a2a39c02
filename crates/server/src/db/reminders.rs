//! Reminder repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use parley_core::{ContactId, ReminderId, ReminderStatus, UserId};

use super::RepositoryError;
use crate::models::Reminder;

#[derive(Debug, sqlx::FromRow)]
struct ReminderRow {
    id: i32,
    contact_id: Option<i32>,
    title: String,
    body: Option<String>,
    due_at: DateTime<Utc>,
    status: ReminderStatus,
    notify_contact: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReminderRow> for Reminder {
    fn from(row: ReminderRow) -> Self {
        Self {
            id: ReminderId::new(row.id),
            contact_id: row.contact_id.map(ContactId::new),
            title: row.title,
            body: row.body,
            due_at: row.due_at,
            status: row.status,
            notify_contact: row.notify_contact,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DueRow {
    user_id: i32,
    #[sqlx(flatten)]
    reminder: ReminderRow,
}

const REMINDER_COLUMNS: &str =
    "id, contact_id, title, body, due_at, status, notify_contact, created_at, updated_at";

/// Editable reminder fields.
#[derive(Debug, Clone)]
pub struct ReminderFields {
    pub contact_id: Option<ContactId>,
    pub title: String,
    pub body: Option<String>,
    pub due_at: DateTime<Utc>,
    pub notify_contact: bool,
}

/// Repository for reminders.
pub struct ReminderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReminderRepository<'a> {
    /// Create a new reminder repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List reminders by due date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        status: Option<ReminderStatus>,
    ) -> Result<Vec<Reminder>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReminderRow>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM parley.reminder
             WHERE user_id = $1 AND ($2::parley.reminder_status IS NULL OR status = $2)
             ORDER BY due_at, id"
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Reminder::from).collect())
    }

    /// Get one reminder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: ReminderId,
    ) -> Result<Option<Reminder>, RepositoryError> {
        let row = sqlx::query_as::<_, ReminderRow>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM parley.reminder WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Reminder::from))
    }

    /// Create a pending reminder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if a contact is given that does not
    /// belong to this tenant.
    pub async fn create(
        &self,
        user_id: UserId,
        fields: &ReminderFields,
    ) -> Result<Reminder, RepositoryError> {
        let row = sqlx::query_as::<_, ReminderRow>(&format!(
            "INSERT INTO parley.reminder (user_id, contact_id, title, body, due_at, notify_contact)
             SELECT $1, $2, $3, $4, $5, $6
             WHERE $2::int IS NULL
                OR EXISTS (SELECT 1 FROM parley.contact WHERE user_id = $1 AND id = $2)
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(fields.contact_id)
        .bind(&fields.title)
        .bind(fields.body.as_deref())
        .bind(fields.due_at)
        .bind(fields.notify_contact)
        .fetch_optional(self.pool)
        .await?;

        row.map(Reminder::from).ok_or(RepositoryError::NotFound)
    }

    /// Replace a reminder's fields and status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the reminder (or a given
    /// contact) does not belong to this tenant.
    pub async fn update(
        &self,
        user_id: UserId,
        id: ReminderId,
        fields: &ReminderFields,
        status: ReminderStatus,
    ) -> Result<Reminder, RepositoryError> {
        let row = sqlx::query_as::<_, ReminderRow>(&format!(
            "UPDATE parley.reminder
             SET contact_id = $3, title = $4, body = $5, due_at = $6,
                 notify_contact = $7, status = $8
             WHERE user_id = $1 AND id = $2
               AND ($3::int IS NULL
                    OR EXISTS (SELECT 1 FROM parley.contact WHERE user_id = $1 AND id = $3))
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(fields.contact_id)
        .bind(&fields.title)
        .bind(fields.body.as_deref())
        .bind(fields.due_at)
        .bind(fields.notify_contact)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        row.map(Reminder::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a reminder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the reminder does not exist for
    /// this tenant.
    pub async fn delete(&self, user_id: UserId, id: ReminderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM parley.reminder WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Pending reminders of every tenant that are due at `now`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<(UserId, Reminder)>, RepositoryError> {
        let rows = sqlx::query_as::<_, DueRow>(&format!(
            "SELECT user_id, {REMINDER_COLUMNS} FROM parley.reminder
             WHERE status = 'pending' AND due_at <= $1
             ORDER BY due_at, id
             LIMIT $2"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (UserId::new(row.user_id), row.reminder.into()))
            .collect())
    }

    /// Mark a pending reminder as sent.
    ///
    /// Returns `None` if it was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_sent(
        &self,
        user_id: UserId,
        id: ReminderId,
    ) -> Result<Option<Reminder>, RepositoryError> {
        let row = sqlx::query_as::<_, ReminderRow>(&format!(
            "UPDATE parley.reminder SET status = 'sent'
             WHERE user_id = $1 AND id = $2 AND status = 'pending'
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Reminder::from))
    }
}
