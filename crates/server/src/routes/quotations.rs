//! Quotations.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Deserialize;

use parley_core::{ContactId, QuotationId, QuotationStatus};

use super::optional;
use crate::db::QuotationRepository;
use crate::db::sales::QuotationUpdate;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::{NewLineItem, OrderDetail, Quotation, QuotationDetail};
use crate::realtime::events;
use crate::services::sales::price_lines;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotations", get(index).post(create))
        .route("/quotations/{id}", get(show).put(update).delete(destroy))
        .route("/quotations/{id}/convert", post(convert))
}

#[derive(Debug, Default, Deserialize)]
pub struct QuotationQuery {
    pub status: Option<QuotationStatus>,
    pub contact_id: Option<ContactId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub contact_id: ContactId,
    pub items: Vec<NewLineItem>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuotationRequest {
    #[serde(default)]
    pub status: Option<QuotationStatus>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

/// GET /api/quotations
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Query(query): Query<QuotationQuery>,
) -> Result<Json<Vec<Quotation>>, AppError> {
    let quotations = QuotationRepository::new(state.pool())
        .list(tenant.id, query.status, query.contact_id)
        .await?;
    Ok(Json(quotations))
}

/// POST /api/quotations
///
/// # Errors
///
/// 400 for invalid items, 404 for an unknown contact.
pub async fn create(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<QuotationDetail>), AppError> {
    let lines = price_lines(state.pool(), tenant.id, &body.items).await?;
    let notes = optional(body.notes);

    let detail = QuotationRepository::new(state.pool())
        .create(
            tenant.id,
            body.contact_id,
            &lines,
            body.valid_until,
            notes.as_deref(),
        )
        .await?;

    tracing::info!(
        tenant = %tenant.id,
        quotation = %detail.quotation.number,
        total = %detail.quotation.total,
        "quotation created"
    );
    state
        .events()
        .emit(tenant.id, events::QUOTATION_UPDATED, &detail.quotation);
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/quotations/{id}
///
/// # Errors
///
/// 404 for an unknown quotation.
pub async fn show(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<QuotationId>,
) -> Result<Json<QuotationDetail>, AppError> {
    let detail = QuotationRepository::new(state.pool())
        .get_detail(tenant.id, id)
        .await?;
    Ok(Json(detail))
}

/// PUT /api/quotations/{id}
///
/// # Errors
///
/// 404 for an unknown quotation.
pub async fn update(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<QuotationId>,
    Json(body): Json<UpdateQuotationRequest>,
) -> Result<Json<Quotation>, AppError> {
    let update = QuotationUpdate {
        status: body.status,
        notes: body.notes.map(|n| n.trim().to_owned()),
        valid_until: body.valid_until,
    };
    let quotation = QuotationRepository::new(state.pool())
        .update(tenant.id, id, &update)
        .await?;

    state
        .events()
        .emit(tenant.id, events::QUOTATION_UPDATED, &quotation);
    Ok(Json(quotation))
}

/// DELETE /api/quotations/{id}
///
/// # Errors
///
/// 404 for an unknown quotation.
pub async fn destroy(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<QuotationId>,
) -> Result<StatusCode, AppError> {
    QuotationRepository::new(state.pool())
        .delete(tenant.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Convert a quotation into an order.
///
/// POST /api/quotations/{id}/convert
///
/// # Errors
///
/// 404 for an unknown quotation, 409 if it is rejected, expired or already
/// converted.
pub async fn convert(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<QuotationId>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    let quotations = QuotationRepository::new(state.pool());
    let order = quotations.convert_to_order(tenant.id, id).await?;

    tracing::info!(
        tenant = %tenant.id,
        quotation = %id,
        order = %order.order.number,
        "quotation converted"
    );

    if let Some(quotation) = quotations.get(tenant.id, id).await? {
        state
            .events()
            .emit(tenant.id, events::QUOTATION_UPDATED, &quotation);
    }
    state
        .events()
        .emit(tenant.id, events::ORDER_UPDATED, &order.order);
    Ok((StatusCode::CREATED, Json(order)))
}
