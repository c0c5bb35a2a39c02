//! Parley server library.
//!
//! Multi-tenant WhatsApp CRM backend: the JSON API for the chat and dashboard
//! UIs, WhatsApp and payment gateway webhooks, and a live event relay.
//!
//! # External APIs
//!
//! - WhatsApp Cloud API (per-tenant credentials, encrypted at rest)
//! - Image host (re-hosting inbound media)
//! - Payment gateway (payment links and webhooks)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod image_host;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod realtime;
pub mod routes;
pub mod services;
pub mod signature;
pub mod state;
pub mod whatsapp;

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::create_session_layer;
use crate::routes::events::RELAY_SECRET_HEADER;
use crate::state::AppState;

/// CORS for the browser UI served from the configured base URL.
fn cors_layer(base_url: &str) -> Result<CorsLayer, AppError> {
    let origin = HeaderValue::from_str(base_url.trim_end_matches('/'))
        .map_err(|e| AppError::Internal(format!("invalid base URL for CORS: {e}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(RELAY_SECRET_HEADER),
        ])
        .max_age(Duration::from_secs(3600)))
}

/// Build the fully layered application router.
///
/// # Errors
///
/// Returns an error if the session store or CORS origin cannot be configured.
pub fn app(state: AppState) -> Result<Router, AppError> {
    let session_layer = create_session_layer(state.pool(), state.config())
        .map_err(|e| AppError::Internal(format!("session layer: {e}")))?;
    let cors = cors_layer(&state.config().base_url)?;

    Ok(routes::routes()
        .layer(session_layer)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_accepts_base_url() {
        assert!(cors_layer("https://crm.example.com/").is_ok());
        assert!(cors_layer("https://crm.example.com\n").is_err());
    }
}
