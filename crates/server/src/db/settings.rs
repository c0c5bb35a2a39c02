//! Per-tenant settings repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use parley_core::{CurrencyCode, UserId};

use super::RepositoryError;
use crate::models::Settings;

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    user_id: i32,
    whatsapp_phone_number_id: Option<String>,
    whatsapp_business_account_id: Option<String>,
    whatsapp_access_token: Option<String>,
    whatsapp_verify_token: Option<String>,
    business_address: Option<String>,
    currency: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettingsRow> for Settings {
    type Error = RepositoryError;

    fn try_from(row: SettingsRow) -> Result<Self, Self::Error> {
        let currency: CurrencyCode = row.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency in database: {e}"))
        })?;

        Ok(Self {
            user_id: UserId::new(row.user_id),
            whatsapp_phone_number_id: row.whatsapp_phone_number_id,
            whatsapp_business_account_id: row.whatsapp_business_account_id,
            encrypted_access_token: row.whatsapp_access_token,
            whatsapp_verify_token: row.whatsapp_verify_token,
            business_address: row.business_address,
            currency,
            updated_at: Some(row.updated_at),
        })
    }
}

const SETTINGS_COLUMNS: &str = "user_id, whatsapp_phone_number_id, whatsapp_business_account_id, \
     whatsapp_access_token, whatsapp_verify_token, business_address, currency, updated_at";

/// What to do with the stored access token on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenUpdate {
    /// Leave the stored token untouched.
    Keep,
    /// Remove the stored token.
    Clear,
    /// Store a new token (already encrypted).
    Set(String),
}

/// Full settings update. Everything except the token is replaced.
#[derive(Debug, Clone)]
pub struct SettingsUpdate {
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,
    pub access_token: TokenUpdate,
    pub whatsapp_verify_token: Option<String>,
    pub business_address: Option<String>,
    pub currency: CurrencyCode,
}

/// Repository for tenant settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a tenant's settings, or defaults if none were saved yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Settings, RepositoryError> {
        let row = sqlx::query_as::<_, SettingsRow>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM parley.settings WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map_or_else(|| Ok(Settings::empty(user_id)), TryInto::try_into)
    }

    /// Insert or replace a tenant's settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone number id is already
    /// linked to another tenant.
    pub async fn upsert(
        &self,
        user_id: UserId,
        update: &SettingsUpdate,
    ) -> Result<Settings, RepositoryError> {
        let (token, replace_token) = match &update.access_token {
            TokenUpdate::Keep => (None, false),
            TokenUpdate::Clear => (None, true),
            TokenUpdate::Set(value) => (Some(value.as_str()), true),
        };

        let row = sqlx::query_as::<_, SettingsRow>(&format!(
            "INSERT INTO parley.settings (
                 user_id, whatsapp_phone_number_id, whatsapp_business_account_id,
                 whatsapp_access_token, whatsapp_verify_token, business_address, currency
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id) DO UPDATE SET
                 whatsapp_phone_number_id = EXCLUDED.whatsapp_phone_number_id,
                 whatsapp_business_account_id = EXCLUDED.whatsapp_business_account_id,
                 whatsapp_access_token = CASE WHEN $8
                     THEN EXCLUDED.whatsapp_access_token
                     ELSE parley.settings.whatsapp_access_token END,
                 whatsapp_verify_token = EXCLUDED.whatsapp_verify_token,
                 business_address = EXCLUDED.business_address,
                 currency = EXCLUDED.currency
             RETURNING {SETTINGS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(update.whatsapp_phone_number_id.as_deref())
        .bind(update.whatsapp_business_account_id.as_deref())
        .bind(token)
        .bind(update.whatsapp_verify_token.as_deref())
        .bind(update.business_address.as_deref())
        .bind(update.currency.as_str())
        .bind(replace_token)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::from_write(
                e,
                "WhatsApp phone number id is already linked to another account",
            )
        })?;

        row.try_into()
    }

    /// Resolve the tenant that owns a WhatsApp business phone number id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_tenant_by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id: Option<i32> = sqlx::query_scalar(
            "SELECT user_id FROM parley.settings WHERE whatsapp_phone_number_id = $1",
        )
        .bind(phone_number_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(id.map(UserId::new))
    }
}
