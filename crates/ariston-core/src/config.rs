// ── Runtime plant configuration ──
//
// Describes *how* to reach one monitored plant and how aggressively the
// sync engine polls and retries. Built by the host application and
// handed in -- this crate never reads config files.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use ariston_api::Timeouts;

/// Production dashboard endpoint.
pub const ARISTON_URL: &str = "https://www.ariston-net.remotethermo.com";

/// Configuration for one monitored plant.
///
/// The defaults are the reference deployment values; fetching the full
/// dashboard often takes more than ten seconds, so the poll intervals
/// are deliberately generous.
#[derive(Debug, Clone)]
pub struct PlantConfig {
    /// Display name; availability events are scoped to it.
    pub name: String,
    /// Backend root URL.
    pub url: Url,
    /// Account email.
    pub username: String,
    /// Account password.
    pub password: SecretString,
    /// Poll interval while the backend is healthy.
    pub poll_interval: Duration,
    /// Poll interval once consecutive errors reach `degrade_threshold` --
    /// gives the system a little rest.
    pub degraded_poll_interval: Duration,
    /// Consecutive errors after which polling slows down.
    pub degrade_threshold: u32,
    /// Consecutive errors beyond which the plant reads as unavailable.
    pub max_errors: u32,
    /// Grace window after a write starts during which polls skip
    /// reading, so a read cannot race the write's own not-yet-applied
    /// state.
    pub set_lock_interval: Duration,
    /// Delay before a failed or unconfirmed write is reconciled again.
    /// Long enough for at least one full read cycle to complete.
    pub set_retry_delay: Duration,
    /// How many times a pending change is rescheduled before being
    /// abandoned.
    pub max_set_retries: u32,
    /// Per-endpoint request timeouts.
    pub timeouts: Timeouts,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            name: "Ariston".into(),
            url: ARISTON_URL.parse().expect("default URL is valid"),
            username: String::new(),
            password: SecretString::from(String::new()),
            poll_interval: Duration::from_secs(45),
            degraded_poll_interval: Duration::from_secs(80),
            degrade_threshold: 2,
            max_errors: 4,
            set_lock_interval: Duration::from_secs(25),
            set_retry_delay: Duration::from_secs(160),
            max_set_retries: 1,
            timeouts: Timeouts::default(),
        }
    }
}
