//! Broadcast sending.
//!
//! Starting a broadcast validates everything up front, creates the recipient
//! rows and returns; the sends run on a detached task that reports progress
//! over the event bus.

use std::collections::HashMap;

use tracing::{Instrument, error, info, info_span, instrument};

use parley_core::{BroadcastId, BroadcastStatus, ContactId, MessageStatus, TagId, UserId};

use crate::db::{BroadcastRepository, ContactRepository, TagRepository};
use crate::error::AppError;
use crate::models::{Broadcast, BroadcastRecipient, Contact};
use crate::realtime::events;
use crate::state::AppState;
use crate::whatsapp::{OutboundContent, WhatsAppCredentials};

use super::messaging::MessagingService;

/// Who receives a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Contacts(Vec<ContactId>),
    Tag(TagId),
}

/// Starts broadcasts.
pub struct BroadcastService<'a> {
    state: &'a AppState,
}

impl<'a> BroadcastService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Start sending a draft broadcast in the background.
    ///
    /// Returns the broadcast (now `sending`) and the number of recipients.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown broadcast or tag,
    /// `AppError::Conflict` if it is not a draft and `AppError::BadRequest`
    /// if there are no recipients or WhatsApp is not configured.
    #[instrument(skip(self, audience), fields(tenant = %user_id, broadcast = %id))]
    pub async fn start(
        &self,
        user_id: UserId,
        id: BroadcastId,
        audience: Audience,
    ) -> Result<(Broadcast, usize), AppError> {
        let pool = self.state.pool();
        let broadcasts = BroadcastRepository::new(pool);

        let broadcast = broadcasts
            .get(user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("broadcast {id}")))?;
        if broadcast.status != BroadcastStatus::Draft {
            return Err(AppError::Conflict(format!(
                "broadcast is {}, only drafts can be sent",
                broadcast.status
            )));
        }

        let content = OutboundContent::Text {
            body: broadcast.body.clone(),
        };
        content.validate().map_err(AppError::BadRequest)?;
        let credentials = MessagingService::new(self.state).credentials(user_id).await?;

        let contacts = match audience {
            Audience::Contacts(ids) => {
                ContactRepository::new(pool).list_by_ids(user_id, &ids).await?
            }
            Audience::Tag(tag_id) => {
                if !TagRepository::new(pool).exists(user_id, tag_id).await? {
                    return Err(AppError::NotFound(format!("tag {tag_id}")));
                }
                ContactRepository::new(pool).list_by_tag(user_id, tag_id).await?
            }
        };
        if contacts.is_empty() {
            return Err(AppError::BadRequest("broadcast has no recipients".to_string()));
        }

        let ids: Vec<ContactId> = contacts.iter().map(|c| c.id).collect();
        let (broadcast, recipients) = broadcasts.start(user_id, id, &ids).await?;
        let count = recipients.len();
        info!(recipients = count, "broadcast started");

        let contacts: HashMap<ContactId, Contact> =
            contacts.into_iter().map(|c| (c.id, c)).collect();
        let state = self.state.clone();
        tokio::spawn(
            run_broadcast(state, user_id, id, recipients, contacts, credentials, content)
                .instrument(info_span!("broadcast", tenant = %user_id, broadcast = %id)),
        );

        Ok((broadcast, count))
    }
}

async fn run_broadcast(
    state: AppState,
    user_id: UserId,
    id: BroadcastId,
    recipients: Vec<BroadcastRecipient>,
    contacts: HashMap<ContactId, Contact>,
    credentials: WhatsAppCredentials,
    content: OutboundContent,
) {
    let messaging = MessagingService::new(&state);
    let broadcasts = BroadcastRepository::new(state.pool());

    for recipient in recipients {
        let (message_id, failure) = match contacts.get(&recipient.contact_id) {
            Some(contact) => {
                match messaging
                    .deliver(user_id, &credentials, contact, &content)
                    .await
                {
                    Ok(message) if message.status == MessageStatus::Failed => (
                        Some(message.id),
                        Some(
                            message
                                .error
                                .unwrap_or_else(|| "delivery failed".to_string()),
                        ),
                    ),
                    Ok(message) => (Some(message.id), None),
                    Err(e) => (None, Some(e.to_string())),
                }
            }
            None => (None, Some("contact no longer exists".to_string())),
        };

        match broadcasts
            .record_result(id, recipient.id, message_id, failure.as_deref())
            .await
        {
            Ok(progress) => {
                state
                    .events()
                    .emit(user_id, events::BROADCAST_PROGRESS, &progress);
            }
            Err(e) => error!(recipient = %recipient.id, error = %e, "failed to record broadcast result"),
        }
    }

    match broadcasts.finish(id).await {
        Ok(done) => {
            info!(
                sent = done.sent_count,
                failed = done.failed_count,
                status = %done.status,
                "broadcast finished"
            );
            state
                .events()
                .emit(user_id, events::BROADCAST_PROGRESS, &done);
        }
        Err(e) => error!(error = %e, "failed to finish broadcast"),
    }
}
