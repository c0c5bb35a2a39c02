//! Per-tenant settings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parley_core::{CurrencyCode, UserId};

/// Settings row. The access token stays encrypted until a send needs it.
#[derive(Debug, Clone)]
pub struct Settings {
    pub user_id: UserId,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,
    /// `base64(nonce || ciphertext)`, see `crypto::SettingsCipher`.
    pub encrypted_access_token: Option<String>,
    pub whatsapp_verify_token: Option<String>,
    pub business_address: Option<String>,
    pub currency: CurrencyCode,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Settings {
    /// Defaults for a tenant that has never saved settings.
    #[must_use]
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            whatsapp_phone_number_id: None,
            whatsapp_business_account_id: None,
            encrypted_access_token: None,
            whatsapp_verify_token: None,
            business_address: None,
            currency: CurrencyCode::default(),
            updated_at: None,
        }
    }
}

/// Settings as returned by the API. Never carries the access token.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_business_account_id: Option<String>,
    pub has_access_token: bool,
    pub whatsapp_verify_token: Option<String>,
    pub business_address: Option<String>,
    pub currency: CurrencyCode,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Settings> for SettingsView {
    fn from(s: Settings) -> Self {
        Self {
            whatsapp_phone_number_id: s.whatsapp_phone_number_id,
            whatsapp_business_account_id: s.whatsapp_business_account_id,
            has_access_token: s.encrypted_access_token.is_some(),
            whatsapp_verify_token: s.whatsapp_verify_token,
            business_address: s.business_address,
            currency: s.currency,
            updated_at: s.updated_at,
        }
    }
}
