// ── Core error types ──
//
// User-facing errors from ariston-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<ariston_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The backend could not be reached, answered badly, or has no data
    /// to validate against yet.
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// Credentials rejected, or the login never reached the dashboard.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Invalid plant configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<ariston_api::Error> for CoreError {
    fn from(err: ariston_api::Error) -> Self {
        match err {
            ariston_api::Error::Login { message } => CoreError::AuthenticationFailed { message },
            other => CoreError::Communication {
                message: other.to_string(),
            },
        }
    }
}
