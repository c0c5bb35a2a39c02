//! Tenant settings.

use axum::{Json, Router, extract::State, routing::get};
use secrecy::SecretString;
use serde::Deserialize;

use parley_core::CurrencyCode;

use super::optional;
use crate::db::SettingsRepository;
use crate::db::settings::{SettingsUpdate, TokenUpdate};
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::SettingsView;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(show).put(update))
}

/// Settings replacement.
///
/// `whatsapp_access_token`: absent keeps the stored token, an empty string
/// removes it, anything else replaces it.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub whatsapp_phone_number_id: Option<String>,
    #[serde(default)]
    pub whatsapp_business_account_id: Option<String>,
    #[serde(default)]
    pub whatsapp_access_token: Option<String>,
    #[serde(default)]
    pub whatsapp_verify_token: Option<String>,
    #[serde(default)]
    pub business_address: Option<String>,
    #[serde(default)]
    pub currency: CurrencyCode,
}

/// GET /api/settings
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn show(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
) -> Result<Json<SettingsView>, AppError> {
    let settings = SettingsRepository::new(state.pool()).get(tenant.id).await?;
    Ok(Json(settings.into()))
}

/// PUT /api/settings
///
/// # Errors
///
/// 409 if the phone number id is registered to another tenant.
pub async fn update(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsView>, AppError> {
    let access_token = match body.whatsapp_access_token {
        None => TokenUpdate::Keep,
        Some(token) if token.trim().is_empty() => TokenUpdate::Clear,
        Some(token) => {
            let secret = SecretString::from(token.trim().to_owned());
            TokenUpdate::Set(state.cipher().encrypt(&secret)?)
        }
    };

    let update = SettingsUpdate {
        whatsapp_phone_number_id: optional(body.whatsapp_phone_number_id),
        whatsapp_business_account_id: optional(body.whatsapp_business_account_id),
        access_token,
        whatsapp_verify_token: optional(body.whatsapp_verify_token),
        business_address: optional(body.business_address),
        currency: body.currency,
    };

    let settings = SettingsRepository::new(state.pool())
        .upsert(tenant.id, &update)
        .await?;
    state.invalidate_tenant_cache();

    tracing::info!(tenant = %tenant.id, "settings updated");
    Ok(Json(settings.into()))
}
