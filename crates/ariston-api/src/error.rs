use thiserror::Error;

/// Top-level error type for the `ariston-api` crate.
///
/// Covers every failure mode of the vendor backend: login, transport,
/// status classification, and body decoding. `ariston-core` maps these
/// into user-facing domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login did not land on the plant dashboard (credentials rejected,
    /// account locked, or an unexpected response shape).
    #[error("Login failed: {message}")]
    Login { message: String },

    /// The backend reported the session as no longer authenticated.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The backend answered with a status the dashboard never uses on
    /// success (599 shows up when the vendor gateway gives up on the
    /// heater).
    #[error("Unexpected reply (HTTP {status})")]
    UnexpectedStatus { status: u16 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the session is gone and a fresh
    /// login might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::SessionExpired)
    }
}
