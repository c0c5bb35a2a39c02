//! Tenant account model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parley_core::{Email, UserId};

/// A business account. All CRM data is scoped to one of these.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub business_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
