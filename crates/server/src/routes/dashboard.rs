//! Dashboard summary.

use axum::{Json, Router, extract::State, routing::get};

use crate::db::DashboardRepository;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::DashboardStats;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(stats))
}

/// GET /api/dashboard/stats
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn stats(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(
        DashboardRepository::new(state.pool())
            .stats(tenant.id)
            .await?,
    ))
}
