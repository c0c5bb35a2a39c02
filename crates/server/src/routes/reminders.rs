//! Follow-up reminders.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use parley_core::{ContactId, ReminderId, ReminderStatus};

use super::{optional, required};
use crate::db::ReminderRepository;
use crate::db::reminders::ReminderFields;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::Reminder;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reminders", get(index).post(create))
        .route("/reminders/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReminderQuery {
    pub status: Option<ReminderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderRequest {
    #[serde(default)]
    pub contact_id: Option<ContactId>,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub notify_contact: bool,
    /// Only honoured on update.
    #[serde(default)]
    pub status: Option<ReminderStatus>,
}

impl ReminderRequest {
    fn fields(&self) -> Result<ReminderFields, AppError> {
        if self.notify_contact && self.contact_id.is_none() {
            return Err(AppError::BadRequest(
                "notify_contact requires a contact_id".to_owned(),
            ));
        }
        Ok(ReminderFields {
            contact_id: self.contact_id,
            title: required("title", &self.title)?,
            body: optional(self.body.clone()),
            due_at: self.due_at,
            notify_contact: self.notify_contact,
        })
    }
}

/// GET /api/reminders
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Query(query): Query<ReminderQuery>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    let reminders = ReminderRepository::new(state.pool())
        .list(tenant.id, query.status)
        .await?;
    Ok(Json(reminders))
}

/// POST /api/reminders
///
/// # Errors
///
/// 400 for invalid fields, 404 for an unknown contact.
pub async fn create(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<ReminderRequest>,
) -> Result<(StatusCode, Json<Reminder>), AppError> {
    let fields = body.fields()?;
    let reminder = ReminderRepository::new(state.pool())
        .create(tenant.id, &fields)
        .await?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

/// GET /api/reminders/{id}
///
/// # Errors
///
/// 404 for an unknown reminder.
pub async fn show(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ReminderId>,
) -> Result<Json<Reminder>, AppError> {
    let reminder = ReminderRepository::new(state.pool())
        .get(tenant.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("reminder {id}")))?;
    Ok(Json(reminder))
}

/// PUT /api/reminders/{id}
///
/// Replaces every field. An omitted `status` keeps the current one.
///
/// # Errors
///
/// 400 for invalid fields, 404 for an unknown reminder or contact.
pub async fn update(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ReminderId>,
    Json(body): Json<ReminderRequest>,
) -> Result<Json<Reminder>, AppError> {
    let fields = body.fields()?;
    let repo = ReminderRepository::new(state.pool());
    let status = match body.status {
        Some(status) => status,
        None => {
            repo.get(tenant.id, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("reminder {id}")))?
                .status
        }
    };

    let reminder = repo.update(tenant.id, id, &fields, status).await?;
    Ok(Json(reminder))
}

/// DELETE /api/reminders/{id}
///
/// # Errors
///
/// 404 for an unknown reminder.
pub async fn destroy(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<ReminderId>,
) -> Result<StatusCode, AppError> {
    ReminderRepository::new(state.pool())
        .delete(tenant.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
