//! Outbound WhatsApp messaging.
//!
//! Every send goes through [`MessagingService::deliver`]: a `pending` row is
//! written before the provider is called, then settled to `sent` or `failed`
//! once the client's bounded retry is done.

use chrono::Utc;
use tracing::{instrument, warn};

use parley_core::{ContactId, MessageDirection, MessageStatus, UserId};

use crate::crypto::SettingsCipher;
use crate::db::{ContactRepository, MessageRepository, SettingsRepository};
use crate::error::AppError;
use crate::models::{Contact, Message, NewMessage, Settings};
use crate::realtime::events;
use crate::state::AppState;
use crate::whatsapp::{OutboundContent, WhatsAppCredentials};

/// Sends messages to contacts and records them.
pub struct MessagingService<'a> {
    state: &'a AppState,
}

impl<'a> MessagingService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Load and decrypt a tenant's WhatsApp credentials.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if WhatsApp is not configured for the
    /// tenant.
    pub async fn credentials(&self, user_id: UserId) -> Result<WhatsAppCredentials, AppError> {
        let settings = SettingsRepository::new(self.state.pool()).get(user_id).await?;
        credentials_from_settings(&settings, self.state.cipher())
    }

    /// Send content to one contact.
    ///
    /// Content and credentials are checked before anything is stored. A
    /// provider failure is not an error here: the returned message carries
    /// `status = failed` and the provider's error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid content or missing
    /// credentials, `AppError::NotFound` for an unknown contact.
    #[instrument(skip(self, content), fields(tenant = %user_id, contact = %contact_id))]
    pub async fn send_to_contact(
        &self,
        user_id: UserId,
        contact_id: ContactId,
        content: &OutboundContent,
    ) -> Result<Message, AppError> {
        content.validate().map_err(AppError::BadRequest)?;

        let contact = ContactRepository::new(self.state.pool())
            .get(user_id, contact_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("contact {contact_id}")))?;
        let credentials = self.credentials(user_id).await?;

        self.deliver(user_id, &credentials, &contact, content).await
    }

    /// Persist, send and settle one message with already loaded credentials.
    ///
    /// # Errors
    ///
    /// Returns an error only if the database writes fail.
    pub async fn deliver(
        &self,
        user_id: UserId,
        credentials: &WhatsAppCredentials,
        contact: &Contact,
        content: &OutboundContent,
    ) -> Result<Message, AppError> {
        let pool = self.state.pool();
        let messages = MessageRepository::new(pool);
        let bus = self.state.events();

        let pending = messages
            .insert(
                user_id,
                &NewMessage {
                    contact_id: contact.id,
                    direction: MessageDirection::Outbound,
                    kind: content.kind(),
                    body: content.body().map(str::to_owned),
                    media_url: content.media_url().map(str::to_owned),
                    filename: content.filename().map(str::to_owned),
                    wamid: None,
                    status: MessageStatus::Pending,
                },
            )
            .await?;
        bus.emit(user_id, events::MESSAGE_CREATED, &pending);

        let settled = match self
            .state
            .whatsapp()
            .send(credentials, contact.phone.as_str(), content)
            .await
        {
            Ok(sent) => messages.mark_sent(user_id, pending.id, &sent.wamid).await?,
            Err(err) => {
                warn!(message = %pending.id, error = %err, "WhatsApp delivery failed");
                messages
                    .mark_failed(user_id, pending.id, &err.to_string())
                    .await?
            }
        };

        ContactRepository::new(pool)
            .touch_last_message(user_id, contact.id, Utc::now())
            .await?;
        bus.emit(user_id, events::MESSAGE_UPDATED, &settled);

        Ok(settled)
    }
}

/// Build send credentials from a settings row.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the phone number id or token is missing,
/// `AppError::Cipher` if the stored token cannot be decrypted.
pub fn credentials_from_settings(
    settings: &Settings,
    cipher: &SettingsCipher,
) -> Result<WhatsAppCredentials, AppError> {
    let (Some(phone_number_id), Some(encrypted)) = (
        settings.whatsapp_phone_number_id.as_deref(),
        settings.encrypted_access_token.as_deref(),
    ) else {
        return Err(AppError::BadRequest(
            "WhatsApp is not configured for this account".to_string(),
        ));
    };

    Ok(WhatsAppCredentials {
        phone_number_id: phone_number_id.to_owned(),
        access_token: cipher.decrypt(encrypted)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use secrecy::{ExposeSecret, SecretString};

    fn cipher() -> SettingsCipher {
        SettingsCipher::from_base64_key(&SecretString::from(SettingsCipher::generate_key()))
            .unwrap()
    }

    #[test]
    fn test_credentials_require_phone_id_and_token() {
        let cipher = cipher();
        let mut settings = Settings::empty(UserId::new(1));
        assert!(matches!(
            credentials_from_settings(&settings, &cipher),
            Err(AppError::BadRequest(_))
        ));

        settings.whatsapp_phone_number_id = Some("10203040".to_string());
        assert!(matches!(
            credentials_from_settings(&settings, &cipher),
            Err(AppError::BadRequest(_))
        ));

        settings.encrypted_access_token = Some(
            cipher
                .encrypt(&SecretString::from("EAAG-token".to_string()))
                .unwrap(),
        );
        let creds = credentials_from_settings(&settings, &cipher).unwrap();
        assert_eq!(creds.phone_number_id, "10203040");
        assert_eq!(creds.access_token.expose_secret(), "EAAG-token");
    }

    #[test]
    fn test_credentials_with_foreign_key_fail_to_decrypt() {
        let mut settings = Settings::empty(UserId::new(1));
        settings.whatsapp_phone_number_id = Some("10203040".to_string());
        settings.encrypted_access_token = Some(
            cipher()
                .encrypt(&SecretString::from("EAAG-token".to_string()))
                .unwrap(),
        );

        assert!(matches!(
            credentials_from_settings(&settings, &cipher()),
            Err(AppError::Cipher(_))
        ));
    }
}
