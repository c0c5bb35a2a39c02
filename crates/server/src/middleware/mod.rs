//! HTTP middleware for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. CORS (credentials allowed for the configured base URL)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Authentication is an extractor ([`RequireTenant`]) rather than a layer, so
//! webhook, relay and health routes stay public without a separate router.

pub mod auth;
pub mod session;

pub use auth::{RequireTenant, clear_current_tenant, set_current_tenant};
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
