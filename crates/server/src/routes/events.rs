//! Realtime delivery: the SSE stream and the server-to-server relay.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use futures::Stream;
use secrecy::ExposeSecret;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::realtime::RealtimeEvent;
use crate::signature::constant_time_compare;
use crate::state::AppState;

/// Header carrying the shared relay secret.
pub const RELAY_SECRET_HEADER: &str = "x-relay-secret";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(stream))
        .route("/relay/emit", post(emit))
}

/// Live events for the logged-in tenant.
///
/// GET /api/events
///
/// Each SSE frame uses the event name (`message.created`, ...) and a JSON data
/// payload. A subscriber that falls behind skips the missed events.
pub async fn stream(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events().subscribe();
    let tenant_id = tenant.id;
    debug!(tenant = %tenant_id, "event stream opened");

    let events = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) if event.tenant_id == tenant_id => {
                    if !event.has_valid_name() {
                        warn!(
                            tenant = %tenant_id,
                            event = ?event.event,
                            "dropping event with invalid name"
                        );
                        continue;
                    }
                    let data = serde_json::to_string(&event.data)
                        .unwrap_or_else(|_| "null".to_string());
                    yield Ok(Event::default().event(event.event).data(data));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(tenant = %tenant_id, skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

#[derive(Debug, Serialize)]
pub struct EmitResponse {
    pub delivered: usize,
}

/// Publish an event from another backend process.
///
/// POST /api/relay/emit
///
/// # Errors
///
/// 403 when no relay secret is configured, 401 for a missing or wrong
/// secret, 400 for a malformed body or an event name that is blank or
/// contains control characters.
pub async fn emit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<EmitResponse>), AppError> {
    let Some(secret) = &state.config().relay_secret else {
        return Err(AppError::Forbidden("relay is disabled".to_owned()));
    };

    let provided = headers
        .get(RELAY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !constant_time_compare(secret.expose_secret(), provided) {
        warn!("relay emit with invalid secret");
        return Err(AppError::Unauthorized("invalid relay secret".to_owned()));
    }

    let event: RealtimeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed event: {e}")))?;
    if !event.has_valid_name() {
        return Err(AppError::BadRequest(
            "event name must be non-blank and free of control characters".to_owned(),
        ));
    }

    let delivered = state.events().publish(event);
    Ok((StatusCode::ACCEPTED, Json(EmitResponse { delivered })))
}
