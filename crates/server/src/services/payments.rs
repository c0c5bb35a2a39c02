//! Payments: gateway links, manual payments and settlement.
//!
//! Settlement (`payment_status` on an order or quotation) is always recomputed
//! from the stored `paid` payments with [`PaymentState::settle`], never
//! incremented, so replayed webhooks cannot double count.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use parley_core::{ContactId, Money, PaymentId, PaymentState, PaymentStatus, UserId};

use crate::db::{
    ContactRepository, OrderRepository, PaymentRepository, QuotationRepository, RepositoryError,
    SettingsRepository,
};
use crate::error::AppError;
use crate::models::{Payment, PaymentTarget};
use crate::payments::{CreatePaymentLink, LinkCustomer, LinkNotify, WebhookEvent};
use crate::realtime::events;
use crate::state::AppState;

/// What a payment is being collected for.
struct TargetSummary {
    contact_id: ContactId,
    number: String,
    total: Money,
    payments: Vec<Payment>,
}

impl TargetSummary {
    fn outstanding(&self) -> Money {
        self.total.saturating_sub(Payment::paid_sum(&self.payments))
    }
}

/// Result of handling one gateway webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The event changed a payment.
    Applied,
    /// The event was understood but changed nothing (replay, unknown row).
    Unchanged,
    /// The event type is not one we act on.
    Ignored,
}

/// Creates and settles payments.
pub struct PaymentService<'a> {
    state: &'a AppState,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Create a gateway payment link for an order or quotation.
    ///
    /// `amount` defaults to the outstanding balance.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the gateway is not configured or the
    /// amount is zero, `AppError::NotFound` for an unknown target and
    /// `AppError::Payment` if the gateway rejects the link.
    #[instrument(skip(self), fields(tenant = %user_id))]
    pub async fn create_link(
        &self,
        user_id: UserId,
        target: PaymentTarget,
        amount: Option<Money>,
    ) -> Result<Payment, AppError> {
        let gateway = self
            .state
            .payments()
            .ok_or_else(|| AppError::BadRequest("payment gateway is not configured".to_string()))?;

        let pool = self.state.pool();
        let summary = self.load_target(user_id, target).await?;
        let amount = amount.unwrap_or_else(|| summary.outstanding());
        if amount.is_zero() {
            return Err(AppError::BadRequest(
                "payment amount must be greater than zero".to_string(),
            ));
        }
        let minor_units = amount.to_minor_units()?;

        let contact = ContactRepository::new(pool)
            .get(user_id, summary.contact_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("contact {}", summary.contact_id)))?;
        let settings = SettingsRepository::new(pool).get(user_id).await?;

        let payments = PaymentRepository::new(pool);
        let pending = payments
            .create(
                user_id,
                target,
                amount,
                PaymentStatus::Pending,
                Payment::METHOD_LINK,
            )
            .await?;

        let request = CreatePaymentLink {
            amount: minor_units,
            currency: settings.currency.to_string(),
            accept_partial: false,
            description: format!("Payment for {}", summary.number),
            reference_id: pending.id.to_string(),
            customer: LinkCustomer {
                name: contact.name.clone(),
                contact: contact.phone.to_e164(),
                email: contact.email.as_ref().map(|e| e.as_str().to_owned()),
            },
            notify: LinkNotify::default(),
            reminder_enable: false,
            notes: HashMap::from([("tenant_id".to_string(), user_id.to_string())]),
        };

        let link = match gateway.create_payment_link(&request).await {
            Ok(link) => link,
            Err(err) => {
                warn!(payment = %pending.id, error = %err, "payment link creation failed");
                payments
                    .close_pending(user_id, pending.id, PaymentStatus::Failed)
                    .await?;
                return Err(err.into());
            }
        };

        let payment = payments
            .set_link(user_id, pending.id, &link.id, &link.short_url)
            .await?;
        info!(payment = %payment.id, link = %link.id, "payment link created");
        self.state
            .events()
            .emit(user_id, events::PAYMENT_UPDATED, &payment);
        Ok(payment)
    }

    /// Record a payment received outside the gateway.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a zero amount or empty method and
    /// `AppError::NotFound` for an unknown target.
    #[instrument(skip(self), fields(tenant = %user_id))]
    pub async fn record_manual(
        &self,
        user_id: UserId,
        target: PaymentTarget,
        amount: Money,
        method: &str,
    ) -> Result<Payment, AppError> {
        if amount.is_zero() {
            return Err(AppError::BadRequest(
                "payment amount must be greater than zero".to_string(),
            ));
        }
        let method = method.trim();
        if method.is_empty() {
            return Err(AppError::BadRequest("payment method is required".to_string()));
        }

        let payment = PaymentRepository::new(self.state.pool())
            .create(user_id, target, amount, PaymentStatus::Paid, method)
            .await?;
        self.state
            .events()
            .emit(user_id, events::PAYMENT_UPDATED, &payment);
        self.settle(user_id, target).await?;
        Ok(payment)
    }

    /// Cancel a pending payment, cancelling its gateway link if it has one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown payment,
    /// `AppError::Conflict` if it is no longer pending and `AppError::Payment`
    /// if the gateway refuses the cancellation.
    #[instrument(skip(self), fields(tenant = %user_id))]
    pub async fn cancel(&self, user_id: UserId, id: PaymentId) -> Result<Payment, AppError> {
        let payments = PaymentRepository::new(self.state.pool());
        let payment = payments
            .get(user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {id}")))?;
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::Conflict(format!(
                "payment is already {}",
                payment.status
            )));
        }

        if let (Some(link_id), Some(gateway)) =
            (payment.gateway_link_id.as_deref(), self.state.payments())
        {
            gateway.cancel_payment_link(link_id).await?;
        }

        let cancelled = payments
            .close_pending(user_id, id, PaymentStatus::Cancelled)
            .await?
            .ok_or_else(|| AppError::Conflict("payment is no longer pending".to_string()))?;
        self.state
            .events()
            .emit(user_id, events::PAYMENT_UPDATED, &cancelled);
        Ok(cancelled)
    }

    /// Recompute and store the settlement state of a target.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown target.
    pub async fn settle(
        &self,
        user_id: UserId,
        target: PaymentTarget,
    ) -> Result<PaymentState, AppError> {
        let pool = self.state.pool();
        let summary = self.load_target(user_id, target).await?;
        let state = PaymentState::settle(summary.total, Payment::paid_amounts(&summary.payments));

        match target {
            PaymentTarget::Order(id) => {
                let orders = OrderRepository::new(pool);
                orders.set_payment_status(user_id, id, state).await?;
                if let Some(order) = orders.get(user_id, id).await? {
                    self.state
                        .events()
                        .emit(user_id, events::ORDER_UPDATED, &order);
                }
            }
            PaymentTarget::Quotation(id) => {
                let quotations = QuotationRepository::new(pool);
                quotations.set_payment_status(user_id, id, state).await?;
                if let Some(quotation) = quotations.get(user_id, id).await? {
                    self.state
                        .events()
                        .emit(user_id, events::QUOTATION_UPDATED, &quotation);
                }
            }
        }

        debug!(?target, %state, "settlement recomputed");
        Ok(state)
    }

    /// Apply a verified gateway webhook.
    ///
    /// Events for rows that no longer exist are acknowledged as
    /// [`WebhookOutcome::Unchanged`] so the gateway stops redelivering them.
    ///
    /// # Errors
    ///
    /// Returns an error only if the database fails.
    #[instrument(skip(self, event), fields(event = %event.event))]
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<WebhookOutcome, AppError> {
        let status = match event.event.as_str() {
            WebhookEvent::LINK_PAID => PaymentStatus::Paid,
            WebhookEvent::LINK_CANCELLED | WebhookEvent::LINK_EXPIRED => PaymentStatus::Cancelled,
            _ => return Ok(WebhookOutcome::Ignored),
        };

        let (Some(tenant), Some(payment_id)) = (event.tenant_id(), event.reference_id()) else {
            warn!("payment webhook without tenant or reference id");
            return Ok(WebhookOutcome::Unchanged);
        };
        let tenant = UserId::new(tenant);
        let payment_id = PaymentId::new(payment_id);
        let payments = PaymentRepository::new(self.state.pool());

        let changed = if status == PaymentStatus::Paid {
            let gateway_payment_id = event.payment().map(|p| p.id.as_str());
            match payments.mark_paid(tenant, payment_id, gateway_payment_id).await {
                Ok((payment, true)) => Some(payment),
                Ok((_, false)) => None,
                Err(RepositoryError::NotFound) => {
                    warn!(payment = %payment_id, "paid webhook for unknown payment");
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            match payments.close_pending(tenant, payment_id, status).await {
                Ok(payment) => payment,
                Err(RepositoryError::NotFound) => None,
                Err(e) => return Err(e.into()),
            }
        };

        let Some(payment) = changed else {
            return Ok(WebhookOutcome::Unchanged);
        };

        info!(payment = %payment.id, status = %payment.status, "payment updated from webhook");
        self.state
            .events()
            .emit(tenant, events::PAYMENT_UPDATED, &payment);
        if payment.status == PaymentStatus::Paid {
            self.settle(tenant, payment.target).await?;
        }
        Ok(WebhookOutcome::Applied)
    }

    async fn load_target(
        &self,
        user_id: UserId,
        target: PaymentTarget,
    ) -> Result<TargetSummary, AppError> {
        let pool = self.state.pool();
        match target {
            PaymentTarget::Order(id) => {
                let detail = OrderRepository::new(pool).get_detail(user_id, id).await?;
                Ok(TargetSummary {
                    contact_id: detail.order.contact_id,
                    number: detail.order.number,
                    total: detail.order.total,
                    payments: detail.payments,
                })
            }
            PaymentTarget::Quotation(id) => {
                let detail = QuotationRepository::new(pool)
                    .get_detail(user_id, id)
                    .await?;
                Ok(TargetSummary {
                    contact_id: detail.quotation.contact_id,
                    number: detail.quotation.number,
                    total: detail.quotation.total,
                    payments: detail.payments,
                })
            }
        }
    }
}
