//! Payment gateway webhook.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde_json::{Value, json};
use tracing::warn;

use crate::error::AppError;
use crate::payments::{SIGNATURE_HEADER, WebhookEvent};
use crate::services::PaymentService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/payments", post(receive))
}

/// POST /api/webhooks/payments
///
/// Unknown events are acknowledged and ignored.
///
/// # Errors
///
/// 403 for a missing or bad signature (or no gateway configured), 400 for
/// malformed JSON.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let Some(gateway) = state.payments() else {
        warn!("payment webhook received but no gateway is configured");
        return Err(AppError::Forbidden("payment gateway is not configured".to_owned()));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !gateway.verify_webhook(&body, signature) {
        warn!("payment webhook signature mismatch");
        return Err(AppError::Forbidden("invalid signature".to_owned()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed webhook payload: {e}")))?;

    let outcome = PaymentService::new(&state).handle_webhook(&event).await?;
    Ok(Json(json!({ "status": outcome })))
}
