//! Payment gateway errors.

use thiserror::Error;

/// Errors that can occur when interacting with the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    /// Payment links are not configured.
    #[error("payment gateway is not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Amount could not be expressed in minor units.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}
