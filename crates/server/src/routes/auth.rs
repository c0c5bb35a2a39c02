//! Tenant registration, login and logout.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireTenant, clear_current_tenant, set_current_tenant};
use crate::models::CurrentTenant;
use crate::services::AuthService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub business_name: String,
    pub password: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn start_session(session: &Session, tenant: &CurrentTenant) -> Result<(), AppError> {
    set_current_tenant(session, tenant)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(tenant.id.as_i32(), Some(tenant.email.as_str()));
    Ok(())
}

/// Create a tenant account and log it in.
///
/// POST /api/auth/register
///
/// # Errors
///
/// 400 for invalid input, 409 if the email is taken.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CurrentTenant>), AppError> {
    let user = AuthService::new(state.pool())
        .register(&body.email, &body.business_name, &body.password)
        .await?;

    let tenant = CurrentTenant::from(&user);
    start_session(&session, &tenant).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

/// Password login.
///
/// POST /api/auth/login
///
/// # Errors
///
/// 401 for unknown email or wrong password.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<CurrentTenant>, AppError> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::info!(error = %e, "login failed"))?;

    let tenant = CurrentTenant::from(&user);
    start_session(&session, &tenant).await?;
    tracing::info!(tenant = %tenant.id, "tenant logged in");
    Ok(Json(tenant))
}

/// Logout.
///
/// POST /api/auth/logout
///
/// # Errors
///
/// 500 if the session store fails.
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_tenant(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in tenant.
///
/// GET /api/auth/me
pub async fn me(RequireTenant(tenant): RequireTenant) -> Json<CurrentTenant> {
    Json(tenant)
}
