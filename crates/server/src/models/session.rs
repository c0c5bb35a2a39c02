//! Session-stored tenant identity.

use serde::{Deserialize, Serialize};

use parley_core::{Email, UserId};

use super::user::User;

/// Minimal data stored in the session to identify the logged-in tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentTenant {
    pub id: UserId,
    pub email: Email,
    pub business_name: String,
}

impl From<&User> for CurrentTenant {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            business_name: user.business_name.clone(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in tenant.
    pub const CURRENT_TENANT: &str = "current_tenant";
}
