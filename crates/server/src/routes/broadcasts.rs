//! Broadcast campaigns.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use parley_core::{BroadcastId, ContactId, TagId};

use super::required;
use crate::db::BroadcastRepository;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::{Broadcast, BroadcastRecipient};
use crate::services::{Audience, BroadcastService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/broadcasts", get(index).post(create))
        .route("/broadcasts/{id}", get(show).put(update).delete(destroy))
        .route("/broadcasts/{id}/send", post(send))
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub name: String,
    pub body: String,
}

impl BroadcastRequest {
    fn validated(&self) -> Result<(String, String), AppError> {
        Ok((required("name", &self.name)?, required("body", &self.body)?))
    }
}

/// Recipients: explicit contacts or everyone with a tag.
#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub contact_ids: Option<Vec<ContactId>>,
    #[serde(default)]
    pub tag_id: Option<TagId>,
}

impl SendRequest {
    fn audience(self) -> Result<Audience, AppError> {
        match (self.contact_ids, self.tag_id) {
            (Some(ids), None) if !ids.is_empty() => Ok(Audience::Contacts(ids)),
            (None, Some(tag)) => Ok(Audience::Tag(tag)),
            _ => Err(AppError::BadRequest(
                "provide either a non-empty contact_ids or a tag_id".to_owned(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BroadcastDetail {
    #[serde(flatten)]
    pub broadcast: Broadcast,
    pub recipients: Vec<BroadcastRecipient>,
}

#[derive(Debug, Serialize)]
pub struct SendAccepted {
    #[serde(flatten)]
    pub broadcast: Broadcast,
    pub recipient_count: usize,
}

/// GET /api/broadcasts
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
) -> Result<Json<Vec<Broadcast>>, AppError> {
    Ok(Json(
        BroadcastRepository::new(state.pool()).list(tenant.id).await?,
    ))
}

/// POST /api/broadcasts
///
/// # Errors
///
/// 400 for a blank name or body.
pub async fn create(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<Broadcast>), AppError> {
    let (name, text) = body.validated()?;
    let broadcast = BroadcastRepository::new(state.pool())
        .create(tenant.id, &name, &text)
        .await?;
    Ok((StatusCode::CREATED, Json(broadcast)))
}

/// GET /api/broadcasts/{id}
///
/// # Errors
///
/// 404 for an unknown broadcast.
pub async fn show(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<BroadcastId>,
) -> Result<Json<BroadcastDetail>, AppError> {
    let repo = BroadcastRepository::new(state.pool());
    let broadcast = repo
        .get(tenant.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("broadcast {id}")))?;
    let recipients = repo.recipients(tenant.id, id).await?;
    Ok(Json(BroadcastDetail {
        broadcast,
        recipients,
    }))
}

/// PUT /api/broadcasts/{id}
///
/// # Errors
///
/// 404 for an unknown broadcast, 409 once it has been sent.
pub async fn update(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<BroadcastId>,
    Json(body): Json<BroadcastRequest>,
) -> Result<Json<Broadcast>, AppError> {
    let (name, text) = body.validated()?;
    let broadcast = BroadcastRepository::new(state.pool())
        .update(tenant.id, id, &name, &text)
        .await?;
    Ok(Json(broadcast))
}

/// DELETE /api/broadcasts/{id}
///
/// # Errors
///
/// 404 for an unknown broadcast, 409 while it is sending.
pub async fn destroy(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<BroadcastId>,
) -> Result<StatusCode, AppError> {
    BroadcastRepository::new(state.pool())
        .delete(tenant.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start sending in the background.
///
/// POST /api/broadcasts/{id}/send
///
/// # Errors
///
/// 400 without recipients or WhatsApp settings, 404 for an unknown broadcast
/// or tag, 409 if it is not a draft.
pub async fn send(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<BroadcastId>,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<SendAccepted>), AppError> {
    let audience = body.audience()?;
    let (broadcast, recipient_count) = BroadcastService::new(&state)
        .start(tenant.id, id, audience)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SendAccepted {
            broadcast,
            recipient_count,
        }),
    ))
}
