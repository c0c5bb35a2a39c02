//! Inbound WhatsApp webhook processing.
//!
//! A delivery is resolved to tenants first; only when every change belongs to
//! a known tenant are statuses and messages applied.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use parley_core::{MessageDirection, MessageStatus, PhoneNumber, UserId};

use crate::db::{ContactRepository, MessageRepository, UserRepository};
use crate::error::AppError;
use crate::models::NewMessage;
use crate::realtime::events;
use crate::state::AppState;
use crate::whatsapp::{
    InboundMessage, MediaRef, StatusUpdate, WebhookChangeValue, WebhookPayload,
    WhatsAppCredentials,
};

use super::messaging::MessagingService;

/// What one webhook delivery changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InboundOutcome {
    pub messages_stored: usize,
    pub duplicates: usize,
    pub statuses_applied: usize,
    pub contacts_created: usize,
}

/// Applies WhatsApp webhook deliveries to the database.
pub struct InboundService<'a> {
    state: &'a AppState,
}

impl<'a> InboundService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Process a verified webhook payload.
    ///
    /// `tenant_hint` is the `tenant` query parameter; it is used for changes
    /// whose phone number id is not registered, and must agree with the
    /// registered owner otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` (before any write) if a change cannot be
    /// attributed to a tenant.
    #[instrument(skip(self, payload))]
    pub async fn process(
        &self,
        payload: &WebhookPayload,
        tenant_hint: Option<UserId>,
    ) -> Result<InboundOutcome, AppError> {
        let mut resolved = Vec::new();
        for entry in &payload.entry {
            for change in &entry.changes {
                let tenant = self.resolve_tenant(&change.value, tenant_hint).await?;
                resolved.push((tenant, &change.value));
            }
        }

        let mut outcome = InboundOutcome::default();
        for (tenant, value) in resolved {
            for status in &value.statuses {
                if self.apply_status(tenant, status).await? {
                    outcome.statuses_applied += 1;
                }
            }

            let mut credentials = None;
            for message in &value.messages {
                self.store_message(tenant, value, message, &mut credentials, &mut outcome)
                    .await?;
            }
        }

        info!(
            stored = outcome.messages_stored,
            duplicates = outcome.duplicates,
            statuses = outcome.statuses_applied,
            "WhatsApp webhook processed"
        );
        Ok(outcome)
    }

    async fn resolve_tenant(
        &self,
        value: &WebhookChangeValue,
        tenant_hint: Option<UserId>,
    ) -> Result<UserId, AppError> {
        let registered = match value.phone_number_id() {
            Some(phone_number_id) => {
                self.state
                    .tenant_for_phone_number_id(phone_number_id)
                    .await?
            }
            None => None,
        };

        match (registered, tenant_hint) {
            (Some(owner), Some(hint)) if owner != hint => Err(AppError::Forbidden(
                "phone number id belongs to another tenant".to_string(),
            )),
            (Some(owner), _) => Ok(owner),
            (None, Some(hint)) => {
                UserRepository::new(self.state.pool())
                    .get_by_id(hint)
                    .await?
                    .ok_or_else(|| AppError::Forbidden("unknown tenant".to_string()))?;
                Ok(hint)
            }
            (None, None) => Err(AppError::Forbidden(
                "webhook does not match any tenant".to_string(),
            )),
        }
    }

    async fn apply_status(&self, tenant: UserId, update: &StatusUpdate) -> Result<bool, AppError> {
        let Some(status) = MessageStatus::from_provider(&update.status) else {
            debug!(status = %update.status, "ignoring unknown status");
            return Ok(false);
        };

        let updated = MessageRepository::new(self.state.pool())
            .apply_status(tenant, &update.id, status, update.error_message().as_deref())
            .await?;

        match updated {
            Some(message) => {
                self.state
                    .events()
                    .emit(tenant, events::MESSAGE_UPDATED, &message);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn store_message(
        &self,
        tenant: UserId,
        value: &WebhookChangeValue,
        message: &InboundMessage,
        credentials: &mut Option<WhatsAppCredentials>,
        outcome: &mut InboundOutcome,
    ) -> Result<(), AppError> {
        let pool = self.state.pool();
        let messages = MessageRepository::new(pool);
        if messages.exists_wamid(&message.id).await? {
            debug!(wamid = %message.id, "duplicate inbound message");
            outcome.duplicates += 1;
            return Ok(());
        }

        let phone = match PhoneNumber::parse(&message.from) {
            Ok(phone) => phone,
            Err(e) => {
                warn!(from = %message.from, error = %e, "skipping message from unparseable sender");
                return Ok(());
            }
        };
        let name = value.profile_name(&message.from).unwrap_or(phone.as_str());

        let contacts = ContactRepository::new(pool);
        let (contact, created) = contacts.find_or_create_by_phone(tenant, &phone, name).await?;
        if created {
            outcome.contacts_created += 1;
            self.state
                .events()
                .emit(tenant, events::CONTACT_CREATED, &contact);
        }

        let media = message.media();
        let media_url = match media {
            Some(media) => self.rehost(tenant, media, credentials).await,
            None => None,
        };

        // A concurrent delivery of the same message can still win the insert.
        let stored = messages
            .insert_inbound(
                tenant,
                &NewMessage {
                    contact_id: contact.id,
                    direction: MessageDirection::Inbound,
                    kind: message.message_kind(),
                    body: message.body(),
                    media_url,
                    filename: media.and_then(|m| m.filename.clone()),
                    wamid: Some(message.id.clone()),
                    status: MessageStatus::Received,
                },
            )
            .await?;

        let Some(stored) = stored else {
            debug!(wamid = %message.id, "duplicate inbound message");
            outcome.duplicates += 1;
            return Ok(());
        };

        contacts
            .touch_last_message(tenant, contact.id, message.sent_at().unwrap_or_else(Utc::now))
            .await?;
        outcome.messages_stored += 1;
        self.state
            .events()
            .emit(tenant, events::MESSAGE_CREATED, &stored);
        Ok(())
    }

    /// Download media from WhatsApp and upload it to the image host.
    ///
    /// Failures are logged and yield `None`; the message is still stored.
    async fn rehost(
        &self,
        tenant: UserId,
        media: &MediaRef,
        credentials: &mut Option<WhatsAppCredentials>,
    ) -> Option<String> {
        let Some(image_host) = self.state.image_host() else {
            warn!(media_id = %media.id, "no image host configured, media not stored");
            return None;
        };

        if credentials.is_none() {
            match MessagingService::new(self.state).credentials(tenant).await {
                Ok(loaded) => *credentials = Some(loaded),
                Err(e) => {
                    warn!(media_id = %media.id, error = %e, "cannot download media without credentials");
                    return None;
                }
            }
        }
        let credentials = credentials.as_ref()?;

        let download = match self
            .state
            .whatsapp()
            .download_media(credentials, &media.id)
            .await
        {
            Ok(download) => download,
            Err(e) => {
                warn!(media_id = %media.id, error = %e, "media download failed");
                return None;
            }
        };

        match image_host
            .upload(&download.bytes, media.filename.as_deref())
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(media_id = %media.id, error = %e, "media re-host failed");
                None
            }
        }
    }
}
