//! Broadcast repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use parley_core::{
    BroadcastId, BroadcastRecipientId, BroadcastStatus, ContactId, MessageId, RecipientStatus,
    UserId,
};

use super::RepositoryError;
use crate::models::{Broadcast, BroadcastRecipient};

#[derive(Debug, sqlx::FromRow)]
struct BroadcastRow {
    id: i32,
    name: String,
    body: String,
    status: BroadcastStatus,
    sent_count: i32,
    failed_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BroadcastRow> for Broadcast {
    fn from(row: BroadcastRow) -> Self {
        Self {
            id: BroadcastId::new(row.id),
            name: row.name,
            body: row.body,
            status: row.status,
            sent_count: row.sent_count,
            failed_count: row.failed_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecipientRow {
    id: i32,
    contact_id: i32,
    status: RecipientStatus,
    message_id: Option<i32>,
    error: Option<String>,
}

impl From<RecipientRow> for BroadcastRecipient {
    fn from(row: RecipientRow) -> Self {
        Self {
            id: BroadcastRecipientId::new(row.id),
            contact_id: ContactId::new(row.contact_id),
            status: row.status,
            message_id: row.message_id.map(MessageId::new),
            error: row.error,
        }
    }
}

const BROADCAST_COLUMNS: &str =
    "id, name, body, status, sent_count, failed_count, created_at, updated_at";

/// Repository for broadcasts and their recipients.
pub struct BroadcastRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BroadcastRepository<'a> {
    /// Create a new broadcast repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List broadcasts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Broadcast>, RepositoryError> {
        let rows = sqlx::query_as::<_, BroadcastRow>(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM parley.broadcast
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Broadcast::from).collect())
    }

    /// Get one broadcast.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: BroadcastId,
    ) -> Result<Option<Broadcast>, RepositoryError> {
        let row = sqlx::query_as::<_, BroadcastRow>(&format!(
            "SELECT {BROADCAST_COLUMNS} FROM parley.broadcast WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Broadcast::from))
    }

    /// Recipients of a broadcast in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recipients(
        &self,
        user_id: UserId,
        id: BroadcastId,
    ) -> Result<Vec<BroadcastRecipient>, RepositoryError> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            "SELECT r.id, r.contact_id, r.status, r.message_id, r.error
             FROM parley.broadcast_recipient r
             JOIN parley.broadcast b ON b.id = r.broadcast_id
             WHERE b.user_id = $1 AND b.id = $2
             ORDER BY r.id",
        )
        .bind(user_id)
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(BroadcastRecipient::from).collect())
    }

    /// Create a draft broadcast.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        name: &str,
        body: &str,
    ) -> Result<Broadcast, RepositoryError> {
        let row = sqlx::query_as::<_, BroadcastRow>(&format!(
            "INSERT INTO parley.broadcast (user_id, name, body) VALUES ($1, $2, $3)
             RETURNING {BROADCAST_COLUMNS}"
        ))
        .bind(user_id)
        .bind(name)
        .bind(body)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Edit a draft broadcast.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the broadcast does not exist for
    /// this tenant, `RepositoryError::Conflict` once it has been sent.
    pub async fn update(
        &self,
        user_id: UserId,
        id: BroadcastId,
        name: &str,
        body: &str,
    ) -> Result<Broadcast, RepositoryError> {
        let row = sqlx::query_as::<_, BroadcastRow>(&format!(
            "UPDATE parley.broadcast SET name = $3, body = $4
             WHERE user_id = $1 AND id = $2 AND status = 'draft'
             RETURNING {BROADCAST_COLUMNS}"
        ))
        .bind(user_id)
        .bind(id)
        .bind(name)
        .bind(body)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                self.get(user_id, id).await?.ok_or(RepositoryError::NotFound)?;
                Err(RepositoryError::Conflict(
                    "only draft broadcasts can be edited".to_owned(),
                ))
            }
        }
    }

    /// Delete a broadcast that is not currently sending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the broadcast does not exist for
    /// this tenant, `RepositoryError::Conflict` while it is sending.
    pub async fn delete(&self, user_id: UserId, id: BroadcastId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM parley.broadcast WHERE user_id = $1 AND id = $2 AND status <> 'sending'",
        )
        .bind(user_id)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.get(user_id, id).await?.ok_or(RepositoryError::NotFound)?;
            return Err(RepositoryError::Conflict(
                "a broadcast cannot be deleted while sending".to_owned(),
            ));
        }
        Ok(())
    }

    /// Move a draft broadcast to `sending` and create its recipient rows.
    ///
    /// Contacts of other tenants are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the broadcast does not exist for
    /// this tenant, `RepositoryError::Conflict` if it is not a draft.
    pub async fn start(
        &self,
        user_id: UserId,
        id: BroadcastId,
        contact_ids: &[ContactId],
    ) -> Result<(Broadcast, Vec<BroadcastRecipient>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<BroadcastStatus> = sqlx::query_scalar(
            "SELECT status FROM parley.broadcast WHERE user_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        match status {
            None => return Err(RepositoryError::NotFound),
            Some(BroadcastStatus::Draft) => {}
            Some(other) => {
                return Err(RepositoryError::Conflict(format!(
                    "broadcast is {other}, only drafts can be sent"
                )));
            }
        }

        let raw: Vec<i32> = contact_ids.iter().map(ContactId::as_i32).collect();
        let recipients = sqlx::query_as::<_, RecipientRow>(
            "INSERT INTO parley.broadcast_recipient (broadcast_id, contact_id)
             SELECT $2, c.id FROM parley.contact c
             WHERE c.user_id = $1 AND c.id = ANY($3)
             ORDER BY c.id
             ON CONFLICT (broadcast_id, contact_id) DO NOTHING
             RETURNING id, contact_id, status, message_id, error",
        )
        .bind(user_id)
        .bind(id)
        .bind(raw)
        .fetch_all(&mut *tx)
        .await?;

        let broadcast = sqlx::query_as::<_, BroadcastRow>(&format!(
            "UPDATE parley.broadcast SET status = 'sending', sent_count = 0, failed_count = 0
             WHERE id = $1
             RETURNING {BROADCAST_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((
            broadcast.into(),
            recipients.into_iter().map(BroadcastRecipient::from).collect(),
        ))
    }

    /// Record the outcome for one recipient and bump the matching counter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn record_result(
        &self,
        id: BroadcastId,
        recipient_id: BroadcastRecipientId,
        message_id: Option<MessageId>,
        error: Option<&str>,
    ) -> Result<Broadcast, RepositoryError> {
        let status = if error.is_none() {
            RecipientStatus::Sent
        } else {
            RecipientStatus::Failed
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE parley.broadcast_recipient SET status = $3, message_id = $4, error = $5
             WHERE broadcast_id = $1 AND id = $2",
        )
        .bind(id)
        .bind(recipient_id)
        .bind(status)
        .bind(message_id)
        .bind(error)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, BroadcastRow>(&format!(
            "UPDATE parley.broadcast
             SET sent_count = sent_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                 failed_count = failed_count + CASE WHEN $2 THEN 0 ELSE 1 END
             WHERE id = $1
             RETURNING {BROADCAST_COLUMNS}"
        ))
        .bind(id)
        .bind(status == RecipientStatus::Sent)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Close a sending broadcast: `failed` if nothing was delivered,
    /// `completed` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the broadcast no longer exists.
    pub async fn finish(&self, id: BroadcastId) -> Result<Broadcast, RepositoryError> {
        let row = sqlx::query_as::<_, BroadcastRow>(&format!(
            "UPDATE parley.broadcast
             SET status = CASE
                 WHEN sent_count = 0 AND failed_count > 0 THEN 'failed'::parley.broadcast_status
                 ELSE 'completed'::parley.broadcast_status
             END
             WHERE id = $1
             RETURNING {BROADCAST_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Broadcast::from).ok_or(RepositoryError::NotFound)
    }
}
