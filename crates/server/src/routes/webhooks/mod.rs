//! Provider webhooks.
//!
//! These routes carry no session. Each provider authenticates with an HMAC of
//! the raw body, so handlers take the body as bytes and verify before parsing.

pub mod payments;
pub mod whatsapp;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(whatsapp::router())
        .merge(payments::router())
}
