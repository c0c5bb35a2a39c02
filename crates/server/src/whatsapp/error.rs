//! WhatsApp-related errors.

use thiserror::Error;

/// Errors that can occur when talking to the WhatsApp Cloud API.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// The request was rejected with a 4xx status. Never retried.
    #[error("WhatsApp rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The API answered with a 5xx status.
    #[error("WhatsApp server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The request did not complete (connect, timeout, body read).
    #[error("WhatsApp request failed: {0}")]
    Network(String),

    /// A 2xx response could not be understood.
    #[error("WhatsApp response error: {0}")]
    Parse(String),

    /// Every attempt failed with a retryable error.
    #[error("WhatsApp delivery failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The outbound content is not sendable.
    #[error("Invalid message: {0}")]
    InvalidContent(String),
}

impl WhatsAppError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Network(_))
    }
}

impl From<reqwest::Error> for WhatsAppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(
            WhatsAppError::Server {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(WhatsAppError::Network("reset".to_string()).is_retryable());
        assert!(
            !WhatsAppError::Rejected {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!WhatsAppError::Parse("bad json".to_string()).is_retryable());
    }
}
