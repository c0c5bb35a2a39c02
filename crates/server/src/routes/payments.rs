//! Payment links and manual payments.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use serde::Deserialize;

use parley_core::{Money, OrderId, PaymentId, QuotationId};

use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::{Payment, PaymentTarget};
use crate::services::PaymentService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", post(record_manual))
        .route("/payments/links", post(create_link))
        .route("/payments/{id}/cancel", post(cancel))
}

/// Exactly one of `order_id` / `quotation_id`.
#[derive(Debug, Deserialize)]
pub struct TargetFields {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub quotation_id: Option<QuotationId>,
}

impl TargetFields {
    fn target(&self) -> Result<PaymentTarget, AppError> {
        PaymentTarget::from_ids(self.order_id, self.quotation_id).ok_or_else(|| {
            AppError::BadRequest("exactly one of order_id or quotation_id is required".to_owned())
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    #[serde(flatten)]
    pub target: TargetFields,
    /// Defaults to the outstanding balance.
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Debug, Deserialize)]
pub struct ManualPaymentRequest {
    #[serde(flatten)]
    pub target: TargetFields,
    pub amount: Money,
    pub method: String,
}

/// POST /api/payments/links
///
/// # Errors
///
/// 400 for a bad target, a zero amount or no configured gateway; 404 for an
/// unknown target; 502 if the gateway fails.
pub async fn create_link(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let target = body.target.target()?;
    let payment = PaymentService::new(&state)
        .create_link(tenant.id, target, body.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// POST /api/payments
///
/// # Errors
///
/// 400 for a bad target, zero amount or blank method; 404 for an unknown
/// target.
pub async fn record_manual(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<ManualPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let target = body.target.target()?;
    let payment = PaymentService::new(&state)
        .record_manual(tenant.id, target, body.amount, &body.method)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// POST /api/payments/{id}/cancel
///
/// # Errors
///
/// 404 for an unknown payment, 409 if it is not pending.
pub async fn cancel(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<PaymentId>,
) -> Result<Json<Payment>, AppError> {
    let payment = PaymentService::new(&state).cancel(tenant.id, id).await?;
    Ok(Json(payment))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_link_request_accepts_either_target() {
        let req: CreateLinkRequest = serde_json::from_str(r#"{"order_id": 4}"#).unwrap();
        assert_eq!(req.target.target().unwrap(), PaymentTarget::Order(OrderId::new(4)));
        assert!(req.amount.is_none());

        let req: CreateLinkRequest =
            serde_json::from_str(r#"{"quotation_id": 9, "amount": "150.00"}"#).unwrap();
        assert_eq!(
            req.target.target().unwrap(),
            PaymentTarget::Quotation(QuotationId::new(9))
        );
        assert_eq!(req.amount.unwrap().to_string(), "150.00");
    }

    #[test]
    fn test_link_request_rejects_ambiguous_target() {
        let req: CreateLinkRequest =
            serde_json::from_str(r#"{"order_id": 1, "quotation_id": 2}"#).unwrap();
        assert!(matches!(req.target.target(), Err(AppError::BadRequest(_))));

        let req: CreateLinkRequest = serde_json::from_str("{}").unwrap();
        assert!(req.target.target().is_err());
    }
}
