//! Chat message repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use parley_core::{
    ContactId, MessageDirection, MessageId, MessageKind, MessageStatus, UserId,
};

use super::RepositoryError;
use crate::models::{Message, NewMessage};

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i32,
    contact_id: i32,
    direction: MessageDirection,
    kind: MessageKind,
    body: Option<String>,
    media_url: Option<String>,
    filename: Option<String>,
    wamid: Option<String>,
    status: MessageStatus,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: MessageId::new(row.id),
            contact_id: ContactId::new(row.contact_id),
            direction: row.direction,
            kind: row.kind,
            body: row.body,
            media_url: row.media_url,
            filename: row.filename,
            wamid: row.wamid,
            status: row.status,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const MESSAGE_COLUMNS: &str = "id, contact_id, direction, kind, body, media_url, filename, \
     wamid, status, error, created_at, updated_at";

/// Default and maximum page of a conversation.
pub const CONVERSATION_LIMIT: i64 = 500;

/// Repository for chat messages.
pub struct MessageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The latest messages of a conversation, in chronological order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_contact(
        &self,
        user_id: UserId,
        contact_id: ContactId,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let limit = limit
            .unwrap_or(CONVERSATION_LIMIT)
            .clamp(1, CONVERSATION_LIMIT);

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT * FROM (
                 SELECT {MESSAGE_COLUMNS} FROM parley.message
                 WHERE user_id = $1 AND contact_id = $2
                 ORDER BY created_at DESC, id DESC
                 LIMIT $3
             ) latest
             ORDER BY created_at, id"
        ))
        .bind(user_id)
        .bind(contact_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    /// Insert a message for a contact of this tenant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact does not belong to
    /// this tenant.
    pub async fn insert(
        &self,
        user_id: UserId,
        message: &NewMessage,
    ) -> Result<Message, RepositoryError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "INSERT INTO parley.message
                 (user_id, contact_id, direction, kind, body, media_url, filename, wamid, status)
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
             WHERE EXISTS (SELECT 1 FROM parley.contact WHERE user_id = $1 AND id = $2)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(message.contact_id)
        .bind(message.direction)
        .bind(message.kind)
        .bind(message.body.as_deref())
        .bind(message.media_url.as_deref())
        .bind(message.filename.as_deref())
        .bind(message.wamid.as_deref())
        .bind(message.status)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "message id already recorded"))?;

        row.map(Message::from).ok_or(RepositoryError::NotFound)
    }

    /// Whether a message with this WhatsApp id is already stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists_wamid(&self, wamid: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM parley.message WHERE wamid = $1)")
                .bind(wamid)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Insert an inbound message unless its `wamid` is already stored.
    ///
    /// Returns `None` for a redelivered message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_inbound(
        &self,
        user_id: UserId,
        message: &NewMessage,
    ) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "INSERT INTO parley.message
                 (user_id, contact_id, direction, kind, body, media_url, filename, wamid, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (wamid) DO NOTHING
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(message.contact_id)
        .bind(message.direction)
        .bind(message.kind)
        .bind(message.body.as_deref())
        .bind(message.media_url.as_deref())
        .bind(message.filename.as_deref())
        .bind(message.wamid.as_deref())
        .bind(message.status)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Message::from))
    }

    /// Record a successful send.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the message does not exist for
    /// this tenant.
    pub async fn mark_sent(
        &self,
        user_id: UserId,
        id: MessageId,
        wamid: &str,
    ) -> Result<Message, RepositoryError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "UPDATE parley.message SET status = 'sent', wamid = $3, error = NULL
             WHERE user_id = $1 AND id = $2
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(wamid)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "message id already recorded"))?;

        row.map(Message::from).ok_or(RepositoryError::NotFound)
    }

    /// Record a failed send.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the message does not exist for
    /// this tenant.
    pub async fn mark_failed(
        &self,
        user_id: UserId,
        id: MessageId,
        error: &str,
    ) -> Result<Message, RepositoryError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "UPDATE parley.message SET status = 'failed', error = $3
             WHERE user_id = $1 AND id = $2
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(error)
        .fetch_optional(self.pool)
        .await?;

        row.map(Message::from).ok_or(RepositoryError::NotFound)
    }

    /// Apply a provider status callback to the message with this `wamid`.
    ///
    /// Returns the updated message, or `None` when no message matches or the
    /// callback would move the status backwards.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn apply_status(
        &self,
        user_id: UserId,
        wamid: &str,
        status: MessageStatus,
        error: Option<&str>,
    ) -> Result<Option<Message>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(i32, MessageStatus)> = sqlx::query_as(
            "SELECT id, status FROM parley.message
             WHERE user_id = $1 AND wamid = $2
             FOR UPDATE",
        )
        .bind(user_id)
        .bind(wamid)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, current)) = current else {
            return Ok(None);
        };
        if !current.can_advance_to(status) {
            tracing::debug!(wamid, %current, next = %status, "ignoring stale status callback");
            return Ok(None);
        }

        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "UPDATE parley.message SET status = $2, error = COALESCE($3, error)
             WHERE id = $1
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(error)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }
}
