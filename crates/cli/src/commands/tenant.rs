//! Tenant management commands.
//!
//! # Usage
//!
//! ```bash
//! parley tenant create -e owner@example.com -b "Asha Traders" -p 'long password'
//! ```

use parley_core::UserId;
use parley_server::services::{AuthError, AuthService};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during tenant operations.
#[derive(Debug, Error)]
pub enum TenantError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a tenant and return its id.
pub async fn create(email: &str, business_name: &str, password: &str) -> Result<UserId, TenantError> {
    let pool = connect().await?;

    tracing::info!("Creating tenant: {} ({})", email, business_name);
    let user = AuthService::new(&pool)
        .register(email, business_name, password)
        .await?;

    tracing::info!("Tenant created with id {}", user.id);
    Ok(user.id)
}
