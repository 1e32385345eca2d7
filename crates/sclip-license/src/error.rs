//! License protocol error types.

use thiserror::Error;

pub type LicenseResult<T> = Result<T, LicenseError>;

/// Errors from the license activation protocol.
#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("Invalid license key")]
    InvalidKey,

    #[error("License has been revoked")]
    Revoked,

    #[error("License activation limit reached")]
    ActivationLimitReached,

    #[error("License server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Cannot reach license server: {0}")]
    Network(String),

    #[error("No activation token stored")]
    NoToken,

    #[error("Token store error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Malformed server response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<reqwest::Error> for LicenseError {
    fn from(e: reqwest::Error) -> Self {
        LicenseError::Network(e.to_string())
    }
}
