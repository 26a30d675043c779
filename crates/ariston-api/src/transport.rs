// Shared transport configuration for building reqwest::Client instances.
//
// The dashboard backend authenticates through a cookie session, so every
// client is built around a cookie jar. Per-call timeouts live here too:
// login must fail fast, while a dashboard read routinely takes north of
// ten seconds on the reference deployment.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;

/// Per-endpoint request timeouts.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Login either redirects quickly or hangs.
    pub login: Duration,
    /// Full dashboard read.
    pub get: Duration,
    /// Plant-and-zone write.
    pub set: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            login: Duration::from_secs(3),
            get: Duration::from_secs(15),
            set: Duration::from_secs(15),
        }
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub timeouts: Timeouts,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// No client-wide timeout is set; each endpoint applies its own from
    /// [`Timeouts`].
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        let mut builder = reqwest::Client::builder().user_agent("ariston-rs/0.1.0");

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder.build().map_err(crate::error::Error::Transport)
    }

    /// Create a config with a fresh cookie jar (for session auth).
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }
}
