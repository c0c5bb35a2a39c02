//! Reminder sweeper.
//!
//! A background loop that fires due reminders: optionally messages the
//! contact, marks the reminder `sent` and publishes `reminder.due`.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use parley_core::UserId;

use crate::db::ReminderRepository;
use crate::error::AppError;
use crate::models::Reminder;
use crate::realtime::events;
use crate::state::AppState;
use crate::whatsapp::OutboundContent;

use super::messaging::MessagingService;

/// Reminders fired per sweep.
const SWEEP_BATCH: i64 = 100;

/// Spawn the sweeper loop on the runtime.
pub fn spawn_sweeper(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "reminder sweeper started");

        loop {
            ticker.tick().await;
            match sweep_once(&state).await {
                Ok(0) => {}
                Ok(fired) => debug!(fired, "reminders fired"),
                Err(e) => error!(error = %e, "reminder sweep failed"),
            }
        }
    })
}

/// Fire every reminder that is due now.
///
/// Returns how many reminders were marked `sent`.
///
/// # Errors
///
/// Returns an error if the due reminders cannot be loaded.
pub async fn sweep_once(state: &AppState) -> Result<usize, AppError> {
    let due = ReminderRepository::new(state.pool())
        .due(Utc::now(), SWEEP_BATCH)
        .await?;
    Ok(fire_due(state, due).await)
}

/// Fire a batch of due reminders, returning how many were marked `sent`.
///
/// Each reminder is claimed (`pending` to `sent`) before its contact is
/// messaged, so a reminder is never notified twice. A reminder that cannot
/// be claimed is logged and skipped; the rest of the batch still fires.
pub async fn fire_due(state: &AppState, due: Vec<(UserId, Reminder)>) -> usize {
    let repo = ReminderRepository::new(state.pool());

    let mut fired = 0;
    for (tenant, reminder) in due {
        let sent = match repo.mark_sent(tenant, reminder.id).await {
            Ok(Some(sent)) => sent,
            Ok(None) => {
                debug!(reminder = %reminder.id, "reminder already handled");
                continue;
            }
            Err(e) => {
                error!(
                    tenant = %tenant,
                    reminder = %reminder.id,
                    error = %e,
                    "failed to mark reminder sent"
                );
                continue;
            }
        };

        if sent.notify_contact {
            notify_contact(state, tenant, &sent).await;
        }
        fired += 1;
        state.events().emit(tenant, events::REMINDER_DUE, &sent);
    }
    fired
}

async fn notify_contact(state: &AppState, tenant: UserId, reminder: &Reminder) {
    let Some(contact_id) = reminder.contact_id else {
        debug!(reminder = %reminder.id, "reminder has no contact to notify");
        return;
    };

    let body = reminder
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(&reminder.title)
        .to_owned();

    if let Err(e) = MessagingService::new(state)
        .send_to_contact(tenant, contact_id, &OutboundContent::Text { body })
        .await
    {
        warn!(reminder = %reminder.id, error = %e, "reminder message not sent");
    }
}
