//! Contact and tag repositories.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use parley_core::{ContactId, Email, PhoneNumber, TagId, UserId};

use super::RepositoryError;
use crate::models::{Contact, ContactDetail, ContactFilter, Tag};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    id: i32,
    phone: String,
    name: String,
    email: Option<String>,
    notes: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for Contact {
    type Error = RepositoryError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let phone = PhoneNumber::parse(&row.phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))?;

        Ok(Self {
            id: ContactId::new(row.id),
            phone,
            name: row.name,
            email,
            notes: row.notes,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TagRow {
    id: i32,
    name: String,
    color: String,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Self {
            id: TagId::new(row.id),
            name: row.name,
            color: row.color,
        }
    }
}

const CONTACT_COLUMNS: &str =
    "c.id, c.phone, c.name, c.email, c.notes, c.last_message_at, c.created_at, c.updated_at";

/// Editable contact fields.
#[derive(Debug, Clone)]
pub struct ContactFields {
    pub phone: PhoneNumber,
    pub name: String,
    pub email: Option<Email>,
    pub notes: Option<String>,
}

// =============================================================================
// Contacts
// =============================================================================

/// Repository for contacts.
pub struct ContactRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContactRepository<'a> {
    /// Create a new contact repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List contacts, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        filter: &ContactFilter,
    ) -> Result<Vec<Contact>, RepositoryError> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS}
             FROM parley.contact c
             WHERE c.user_id = $1
               AND ($2::text IS NULL OR c.name ILIKE $2 OR c.phone ILIKE $2 OR c.email ILIKE $2)
               AND ($3::int IS NULL OR EXISTS (
                   SELECT 1 FROM parley.contact_tag ct
                   WHERE ct.contact_id = c.id AND ct.tag_id = $3))
             ORDER BY c.last_message_at DESC NULLS LAST, c.id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(user_id)
        .bind(filter.pattern())
        .bind(filter.tag_id)
        .bind(filter.limit())
        .bind(filter.offset())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every contact of a tenant, oldest first (for exports).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self, user_id: UserId) -> Result<Vec<Contact>, RepositoryError> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM parley.contact c WHERE c.user_id = $1 ORDER BY c.id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Contacts with the given ids; ids of other tenants are silently dropped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_ids(
        &self,
        user_id: UserId,
        ids: &[ContactId],
    ) -> Result<Vec<Contact>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ContactId::as_i32).collect();
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM parley.contact c
             WHERE c.user_id = $1 AND c.id = ANY($2)
             ORDER BY c.id"
        ))
        .bind(user_id)
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Contacts carrying a tag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_tag(
        &self,
        user_id: UserId,
        tag_id: TagId,
    ) -> Result<Vec<Contact>, RepositoryError> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM parley.contact c
             JOIN parley.contact_tag ct ON ct.contact_id = c.id
             WHERE c.user_id = $1 AND ct.tag_id = $2
             ORDER BY c.id"
        ))
        .bind(user_id)
        .bind(tag_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: ContactId,
    ) -> Result<Option<Contact>, RepositoryError> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM parley.contact c WHERE c.user_id = $1 AND c.id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get one contact with its tags.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact does not exist for
    /// this tenant.
    pub async fn get_detail(
        &self,
        user_id: UserId,
        id: ContactId,
    ) -> Result<ContactDetail, RepositoryError> {
        let contact = self.get(user_id, id).await?.ok_or(RepositoryError::NotFound)?;
        let tags = TagRepository::new(self.pool).for_contact(user_id, id).await?;
        Ok(ContactDetail { contact, tags })
    }

    /// Create a contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone number is already a
    /// contact of this tenant.
    pub async fn create(
        &self,
        user_id: UserId,
        fields: &ContactFields,
    ) -> Result<Contact, RepositoryError> {
        let row = sqlx::query_as::<_, ContactRow>(
            "INSERT INTO parley.contact AS c (user_id, phone, name, email, notes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING c.id, c.phone, c.name, c.email, c.notes, c.last_message_at,
                       c.created_at, c.updated_at",
        )
        .bind(user_id)
        .bind(fields.phone.as_str())
        .bind(&fields.name)
        .bind(fields.email.as_ref().map(Email::as_str))
        .bind(fields.notes.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "a contact with this phone number already exists"))?;

        row.try_into()
    }

    /// Replace a contact's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact does not exist for
    /// this tenant, `RepositoryError::Conflict` on a duplicate phone number.
    pub async fn update(
        &self,
        user_id: UserId,
        id: ContactId,
        fields: &ContactFields,
    ) -> Result<Contact, RepositoryError> {
        let row = sqlx::query_as::<_, ContactRow>(
            "UPDATE parley.contact AS c
             SET phone = $3, name = $4, email = $5, notes = $6
             WHERE c.user_id = $1 AND c.id = $2
             RETURNING c.id, c.phone, c.name, c.email, c.notes, c.last_message_at,
                       c.created_at, c.updated_at",
        )
        .bind(user_id)
        .bind(id)
        .bind(fields.phone.as_str())
        .bind(&fields.name)
        .bind(fields.email.as_ref().map(Email::as_str))
        .bind(fields.notes.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "a contact with this phone number already exists"))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a contact and everything hanging off it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact does not exist for
    /// this tenant.
    pub async fn delete(&self, user_id: UserId, id: ContactId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM parley.contact WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Find the contact for a phone number, creating it if needed.
    ///
    /// Returns the contact and whether it was created. Safe under concurrent
    /// webhook deliveries for the same sender.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn find_or_create_by_phone(
        &self,
        user_id: UserId,
        phone: &PhoneNumber,
        name: &str,
    ) -> Result<(Contact, bool), RepositoryError> {
        let inserted = sqlx::query_as::<_, ContactRow>(
            "INSERT INTO parley.contact AS c (user_id, phone, name)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, phone) DO NOTHING
             RETURNING c.id, c.phone, c.name, c.email, c.notes, c.last_message_at,
                       c.created_at, c.updated_at",
        )
        .bind(user_id)
        .bind(phone.as_str())
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((row.try_into()?, true));
        }

        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM parley.contact c WHERE c.user_id = $1 AND c.phone = $2"
        ))
        .bind(user_id)
        .bind(phone.as_str())
        .fetch_one(self.pool)
        .await?;

        Ok((row.try_into()?, false))
    }

    /// Record message activity on a contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn touch_last_message(
        &self,
        user_id: UserId,
        id: ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE parley.contact
             SET last_message_at = GREATEST(COALESCE(last_message_at, $3), $3)
             WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(id)
        .bind(at)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// Tags
// =============================================================================

/// Repository for tags and contact tagging.
pub struct TagRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TagRepository<'a> {
    /// Create a new tag repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a tenant's tags by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Tag>, RepositoryError> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, color FROM parley.tag WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }

    /// Tags attached to a contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_contact(
        &self,
        user_id: UserId,
        contact_id: ContactId,
    ) -> Result<Vec<Tag>, RepositoryError> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT t.id, t.name, t.color
             FROM parley.tag t
             JOIN parley.contact_tag ct ON ct.tag_id = t.id
             WHERE t.user_id = $1 AND ct.contact_id = $2
             ORDER BY t.name",
        )
        .bind(user_id)
        .bind(contact_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }

    /// Whether a tag exists for this tenant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, user_id: UserId, id: TagId) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM parley.tag WHERE user_id = $1 AND id = $2)",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a tag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(
        &self,
        user_id: UserId,
        name: &str,
        color: &str,
    ) -> Result<Tag, RepositoryError> {
        let row = sqlx::query_as::<_, TagRow>(
            "INSERT INTO parley.tag (user_id, name, color) VALUES ($1, $2, $3)
             RETURNING id, name, color",
        )
        .bind(user_id)
        .bind(name)
        .bind(color)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "a tag with this name already exists"))?;

        Ok(row.into())
    }

    /// Rename or recolor a tag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        user_id: UserId,
        id: TagId,
        name: &str,
        color: &str,
    ) -> Result<Tag, RepositoryError> {
        let row = sqlx::query_as::<_, TagRow>(
            "UPDATE parley.tag SET name = $3, color = $4
             WHERE user_id = $1 AND id = $2
             RETURNING id, name, color",
        )
        .bind(user_id)
        .bind(id)
        .bind(name)
        .bind(color)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "a tag with this name already exists"))?;

        row.map(Tag::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a tag (and detach it from every contact).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the tag does not exist.
    pub async fn delete(&self, user_id: UserId, id: TagId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM parley.tag WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Attach a tag to a contact. Attaching twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` unless both the contact and the tag
    /// belong to this tenant.
    pub async fn attach(
        &self,
        user_id: UserId,
        contact_id: ContactId,
        tag_id: TagId,
    ) -> Result<(), RepositoryError> {
        let matched: i64 = sqlx::query_scalar(
            "WITH target AS (
                 SELECT c.id AS contact_id, t.id AS tag_id
                 FROM parley.contact c
                 JOIN parley.tag t ON t.user_id = c.user_id
                 WHERE c.user_id = $1 AND c.id = $2 AND t.id = $3
             ), ins AS (
                 INSERT INTO parley.contact_tag (contact_id, tag_id)
                 SELECT contact_id, tag_id FROM target
                 ON CONFLICT DO NOTHING
             )
             SELECT COUNT(*) FROM target",
        )
        .bind(user_id)
        .bind(contact_id)
        .bind(tag_id)
        .fetch_one(self.pool)
        .await?;

        if matched == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Detach a tag from a contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the contact did not carry the tag.
    pub async fn detach(
        &self,
        user_id: UserId,
        contact_id: ContactId,
        tag_id: TagId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM parley.contact_tag ct
             USING parley.contact c
             WHERE ct.contact_id = c.id AND c.user_id = $1
               AND ct.contact_id = $2 AND ct.tag_id = $3",
        )
        .bind(user_id)
        .bind(contact_id)
        .bind(tag_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
