//! Contacts, contact tags and conversations.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use parley_core::{ContactId, Email, PhoneNumber, TagId};

use super::{optional, required};
use crate::db::contacts::ContactFields;
use crate::db::{ContactRepository, MessageRepository, TagRepository};
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::{Contact, ContactDetail, ContactFilter, Message};
use crate::realtime::events;
use crate::services::MessagingService;
use crate::state::AppState;
use crate::whatsapp::OutboundContent;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(index).post(create))
        .route("/contacts/{id}", get(show).put(update).delete(destroy))
        .route(
            "/contacts/{id}/tags/{tag_id}",
            post(attach_tag).delete(detach_tag),
        )
        .route(
            "/contacts/{id}/messages",
            get(conversation).post(send_message),
        )
}

/// Create/update body.
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub phone: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ContactRequest {
    fn into_fields(self) -> Result<ContactFields, AppError> {
        let email = optional(self.email)
            .map(|e| Email::parse(&e))
            .transpose()?;
        Ok(ContactFields {
            phone: PhoneNumber::parse(&self.phone)?,
            name: required("name", &self.name)?,
            email,
            notes: optional(self.notes),
        })
    }
}

/// GET /api/contacts
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Query(filter): Query<ContactFilter>,
) -> Result<Json<Vec<Contact>>, AppError> {
    let contacts = ContactRepository::new(state.pool())
        .list(tenant.id, &filter)
        .await?;
    Ok(Json(contacts))
}

/// POST /api/contacts
///
/// # Errors
///
/// 400 for invalid fields, 409 for a duplicate phone number.
pub async fn create(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<ContactRequest>,
) -> Result<(StatusCode, Json<Contact>), AppError> {
    let fields = body.into_fields()?;
    let contact = ContactRepository::new(state.pool())
        .create(tenant.id, &fields)
        .await?;

    state
        .events()
        .emit(tenant.id, events::CONTACT_CREATED, &contact);
    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/contacts/{id}
///
/// # Errors
///
/// 404 if the contact does not exist for this tenant.
pub async fn show(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ContactId>,
) -> Result<Json<ContactDetail>, AppError> {
    let detail = ContactRepository::new(state.pool())
        .get_detail(tenant.id, id)
        .await?;
    Ok(Json(detail))
}

/// PUT /api/contacts/{id}
///
/// # Errors
///
/// 400 for invalid fields, 404 for an unknown contact, 409 for a duplicate
/// phone number.
pub async fn update(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ContactId>,
    Json(body): Json<ContactRequest>,
) -> Result<Json<Contact>, AppError> {
    let fields = body.into_fields()?;
    let contact = ContactRepository::new(state.pool())
        .update(tenant.id, id, &fields)
        .await?;

    state
        .events()
        .emit(tenant.id, events::CONTACT_UPDATED, &contact);
    Ok(Json(contact))
}

/// DELETE /api/contacts/{id}
///
/// # Errors
///
/// 404 if the contact does not exist for this tenant.
pub async fn destroy(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ContactId>,
) -> Result<StatusCode, AppError> {
    ContactRepository::new(state.pool())
        .delete(tenant.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/contacts/{id}/tags/{tag_id}
///
/// # Errors
///
/// 404 if the contact or tag does not exist for this tenant.
pub async fn attach_tag(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path((id, tag_id)): Path<(ContactId, TagId)>,
) -> Result<Json<ContactDetail>, AppError> {
    TagRepository::new(state.pool())
        .attach(tenant.id, id, tag_id)
        .await?;
    let detail = ContactRepository::new(state.pool())
        .get_detail(tenant.id, id)
        .await?;

    state
        .events()
        .emit(tenant.id, events::CONTACT_UPDATED, &detail);
    Ok(Json(detail))
}

/// DELETE /api/contacts/{id}/tags/{tag_id}
///
/// # Errors
///
/// 404 if the contact does not exist for this tenant.
pub async fn detach_tag(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path((id, tag_id)): Path<(ContactId, TagId)>,
) -> Result<Json<ContactDetail>, AppError> {
    TagRepository::new(state.pool())
        .detach(tenant.id, id, tag_id)
        .await?;
    let detail = ContactRepository::new(state.pool())
        .get_detail(tenant.id, id)
        .await?;

    state
        .events()
        .emit(tenant.id, events::CONTACT_UPDATED, &detail);
    Ok(Json(detail))
}

/// Conversation query.
#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    pub limit: Option<i64>,
}

/// GET /api/contacts/{id}/messages
///
/// # Errors
///
/// 404 if the contact does not exist for this tenant.
pub async fn conversation(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ContactId>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    ContactRepository::new(state.pool())
        .get(tenant.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("contact {id}")))?;

    let messages = MessageRepository::new(state.pool())
        .list_for_contact(tenant.id, id, query.limit)
        .await?;
    Ok(Json(messages))
}

/// POST /api/contacts/{id}/messages
///
/// The response is the stored message; a provider failure shows up as
/// `status: "failed"` with an `error`, not as an HTTP error.
///
/// # Errors
///
/// 400 for invalid content or missing WhatsApp settings, 404 for an unknown
/// contact.
pub async fn send_message(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ContactId>,
    Json(content): Json<OutboundContent>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = MessagingService::new(&state)
        .send_to_contact(tenant.id, id, &content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
