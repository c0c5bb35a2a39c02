//! Orders.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use parley_core::{ContactId, OrderId, OrderStatus};

use super::optional;
use crate::db::OrderRepository;
use crate::db::sales::OrderUpdate;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::{NewLineItem, Order, OrderDetail};
use crate::realtime::events;
use crate::services::sales::price_lines;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(index).post(create))
        .route("/orders/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub contact_id: Option<ContactId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub contact_id: ContactId,
    pub items: Vec<NewLineItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// GET /api/orders
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list(tenant.id, query.status, query.contact_id)
        .await?;
    Ok(Json(orders))
}

/// POST /api/orders
///
/// # Errors
///
/// 400 for invalid items, 404 for an unknown contact.
pub async fn create(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    let lines = price_lines(state.pool(), tenant.id, &body.items).await?;
    let notes = optional(body.notes);

    let detail = OrderRepository::new(state.pool())
        .create(tenant.id, body.contact_id, &lines, notes.as_deref())
        .await?;

    tracing::info!(
        tenant = %tenant.id,
        order = %detail.order.number,
        total = %detail.order.total,
        "order created"
    );
    state
        .events()
        .emit(tenant.id, events::ORDER_UPDATED, &detail.order);
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/orders/{id}
///
/// # Errors
///
/// 404 for an unknown order.
pub async fn show(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    let detail = OrderRepository::new(state.pool())
        .get_detail(tenant.id, id)
        .await?;
    Ok(Json(detail))
}

/// PUT /api/orders/{id}
///
/// # Errors
///
/// 404 for an unknown order.
pub async fn update(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<OrderId>,
    Json(body): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let update = OrderUpdate {
        status: body.status,
        notes: body.notes.map(|n| n.trim().to_owned()),
    };
    let order = OrderRepository::new(state.pool())
        .update(tenant.id, id, &update)
        .await?;

    state
        .events()
        .emit(tenant.id, events::ORDER_UPDATED, &order);
    Ok(Json(order))
}

/// DELETE /api/orders/{id}
///
/// # Errors
///
/// 404 for an unknown order.
pub async fn destroy(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<OrderId>,
) -> Result<StatusCode, AppError> {
    OrderRepository::new(state.pool())
        .delete(tenant.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
