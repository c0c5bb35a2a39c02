//! CSV downloads.

use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::db::{ContactRepository, OrderRepository};
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::services::export;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export/contacts.csv", get(contacts))
        .route("/export/orders.csv", get(orders))
}

fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/export/contacts.csv
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn contacts(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
) -> Result<Response, AppError> {
    let contacts = ContactRepository::new(state.pool())
        .list_all(tenant.id)
        .await?;
    Ok(csv_attachment("contacts.csv", export::contacts_csv(&contacts)))
}

/// GET /api/export/orders.csv
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn orders(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
) -> Result<Response, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_with_contacts(tenant.id)
        .await?;
    Ok(csv_attachment("orders.csv", export::orders_csv(&orders)))
}
