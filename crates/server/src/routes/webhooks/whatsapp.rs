//! WhatsApp Cloud API webhook.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{info, warn};

use parley_core::UserId;

use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::services::{InboundOutcome, InboundService};
use crate::signature::{constant_time_compare, verify_whatsapp_signature};
use crate::state::AppState;
use crate::whatsapp::WebhookPayload;

/// Header carrying `sha256=<hex hmac>` of the raw body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/whatsapp", get(verify).post(receive))
}

/// Subscription handshake parameters.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
    pub tenant: Option<UserId>,
}

/// Optional tenant hint on deliveries.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryQuery {
    pub tenant: Option<UserId>,
}

/// Subscription handshake.
///
/// GET /api/webhooks/whatsapp
///
/// # Errors
///
/// 403 unless the mode is `subscribe` and the token matches.
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, AppError> {
    let forbidden = || AppError::Forbidden("webhook verification failed".to_owned());

    if query.mode.as_deref() != Some("subscribe") {
        return Err(forbidden());
    }
    let provided = query.verify_token.as_deref().ok_or_else(forbidden)?;

    let expected = match query.tenant {
        Some(tenant) => SettingsRepository::new(state.pool())
            .get(tenant)
            .await?
            .whatsapp_verify_token,
        None => state
            .config()
            .whatsapp
            .verify_token
            .as_ref()
            .map(|t| t.expose_secret().to_owned()),
    };

    match expected {
        Some(expected) if constant_time_compare(&expected, provided) => {
            info!(tenant = ?query.tenant, "whatsapp webhook verified");
            Ok(query.challenge.unwrap_or_default())
        }
        _ => {
            warn!(tenant = ?query.tenant, "whatsapp webhook verification rejected");
            Err(forbidden())
        }
    }
}

/// Messages and status callbacks.
///
/// POST /api/webhooks/whatsapp
///
/// # Errors
///
/// 403 for a bad signature or unknown tenant, 400 for malformed JSON.
pub async fn receive(
    State(state): State<AppState>,
    Query(query): Query<DeliveryQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InboundOutcome>, AppError> {
    if let Some(secret) = &state.config().whatsapp.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_whatsapp_signature(secret.expose_secret().as_bytes(), &body, signature) {
            warn!("whatsapp webhook signature mismatch");
            return Err(AppError::Forbidden("invalid signature".to_owned()));
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed webhook payload: {e}")))?;

    let outcome = InboundService::new(&state)
        .process(&payload, query.tenant)
        .await?;
    Ok(Json(outcome))
}
