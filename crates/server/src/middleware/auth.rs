//! Authentication extractor for tenant sessions.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::models::{CurrentTenant, session_keys};

/// Extractor that requires a logged-in tenant.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireTenant(tenant): RequireTenant,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", tenant.business_name)
/// }
/// ```
pub struct RequireTenant(pub CurrentTenant);

/// Rejection returned when no tenant is logged in.
#[derive(Debug)]
pub struct TenantRejection;

impl IntoResponse for TenantRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized: not logged in" })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for RequireTenant
where
    S: Send + Sync,
{
    type Rejection = TenantRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts.extensions.get::<Session>().ok_or(TenantRejection)?;

        let tenant: CurrentTenant = session
            .get(session_keys::CURRENT_TENANT)
            .await
            .ok()
            .flatten()
            .ok_or(TenantRejection)?;

        Ok(Self(tenant))
    }
}

/// Store the logged-in tenant in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_tenant(
    session: &Session,
    tenant: &CurrentTenant,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_TENANT, tenant).await
}

/// Remove the tenant from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_tenant(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::http::Request;

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let (mut parts, ()) = Request::builder()
            .uri("/api/contacts")
            .body(())
            .unwrap()
            .into_parts();

        let result = RequireTenant::from_request_parts(&mut parts, &()).await;
        let response = match result {
            Ok(_) => panic!("expected rejection"),
            Err(rejection) => rejection.into_response(),
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
