// Ariston NET HTTP client
//
// Wraps `reqwest::Client` with the session lifecycle and the three
// dashboard endpoints. The backend is a classic cookie-session web app:
// login is a POST that redirects into the plant dashboard, and the plant
// id only exists as a path segment of that redirect.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::model::{PlantData, PlantUpdate};
use crate::transport::{Timeouts, TransportConfig};

const LOGIN_PATH: &str = "/Account/Login";

/// Session state: the login flag and the plant id it resolved to.
///
/// Guarded by its own mutex -- the session can be invalidated by either
/// the poll path or the write path concurrently, and holding the lock
/// across the login request serializes competing logins.
#[derive(Debug, Default)]
struct SessionState {
    logged_in: bool,
    plant_id: Option<String>,
}

/// Raw HTTP client for the Ariston NET dashboard.
///
/// One instance per account; the session cookie lives in the client's
/// jar and the resolved plant id is only trusted while the session is
/// believed valid.
pub struct AristonClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    timeouts: Timeouts,
    session: Mutex<SessionState>,
}

impl AristonClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (the dashboard session lives in a cookie).
    pub fn new(
        base_url: Url,
        username: String,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let timeouts = config.timeouts;
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            username,
            password,
            timeouts,
            session: Mutex::new(SessionState::default()),
        })
    }

    /// The backend root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether the session is currently believed valid.
    pub async fn is_logged_in(&self) -> bool {
        self.session.lock().await.logged_in
    }

    /// The plant id resolved by the last successful login, if any.
    pub async fn plant_id(&self) -> Option<String> {
        self.session.lock().await.plant_id.clone()
    }

    /// Drop the session so the next call performs a fresh login.
    ///
    /// Invalidation is collaborative: any caller that sees an
    /// authoritative "unauthorized" answer from the backend routes
    /// through here.
    pub async fn invalidate_session(&self) {
        let mut session = self.session.lock().await;
        if session.logged_in {
            debug!("session invalidated");
        }
        session.logged_in = false;
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Log in unless the session is already established, returning the
    /// plant id.
    ///
    /// Idempotent: an established session performs no network call. The
    /// backend signals success by redirecting into
    /// `/PlantDashboard/Index/{plant_id}`; any non-redirect outcome is a
    /// login failure and leaves the session logged out.
    pub async fn ensure_logged_in(&self) -> Result<String, Error> {
        let mut session = self.session.lock().await;
        if session.logged_in {
            if let Some(ref plant_id) = session.plant_id {
                return Ok(plant_id.clone());
            }
        }

        let url = self.base_url.join(LOGIN_PATH)?;
        debug!(%url, "logging in");

        let body = json!({
            "Email": self.username,
            "Password": self.password.expose_secret(),
        });

        let resp = self
            .http
            .post(url)
            .timeout(self.timeouts.login)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.timeouts.login))?;

        match plant_id_from_dashboard_url(resp.url()) {
            Some(plant_id) => {
                info!(plant_id = %plant_id, "plant id resolved");
                session.plant_id = Some(plant_id.clone());
                session.logged_in = true;
                Ok(plant_id)
            }
            None => {
                warn!(
                    status = resp.status().as_u16(),
                    "login did not reach the plant dashboard"
                );
                Err(Error::Login {
                    message: format!("no dashboard redirect (landed on {})", resp.url().path()),
                })
            }
        }
    }

    // ── Dashboard endpoints ──────────────────────────────────────────

    /// Fetch the full plant dashboard document.
    ///
    /// Status 500 is the backend's way of saying the session is gone:
    /// the session is cleared before the error is returned. Any other
    /// non-success status is a plain communication failure and leaves
    /// the session alone.
    pub async fn get_plant_data(&self, plant_id: &str) -> Result<PlantData, Error> {
        let url = self
            .base_url
            .join(&format!("/PlantDashboard/GetPlantData/{plant_id}"))?;
        debug!(%url, "GET plant data");

        let resp = self
            .http
            .get(url)
            .timeout(self.timeouts.get)
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.timeouts.get))?;

        let status = resp.status();
        if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR {
            warn!(status = status.as_u16(), "dashboard no longer recognizes the session");
            self.invalidate_session().await;
            return Err(Error::SessionExpired);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "unexpected reply");
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        match serde_json::from_str(&body) {
            Ok(data) => {
                debug!("plant data fetched");
                Ok(data)
            }
            Err(e) => {
                // A non-JSON body means the backend silently fell back to
                // a login page; force a fresh login on the next attempt.
                self.invalidate_session().await;
                warn!("invalid data received, not JSON");
                Err(Error::Deserialization {
                    message: e.to_string(),
                    body,
                })
            }
        }
    }

    /// Push a changed document to the plant, returning the echoed state.
    ///
    /// The endpoint wants the full document twice (before/after) and
    /// only targets zone 1 in SI units, matching the dashboard's own
    /// requests.
    pub async fn set_plant_data(
        &self,
        plant_id: &str,
        update: &PlantUpdate,
    ) -> Result<PlantData, Error> {
        let mut url = self
            .base_url
            .join(&format!("/PlantDashboard/SetPlantAndZoneData/{plant_id}"))?;
        url.query_pairs_mut()
            .append_pair("zoneNum", "1")
            .append_pair("umsys", "si");
        debug!(%url, "POST plant data");

        let resp = self
            .http
            .post(url)
            .timeout(self.timeouts.set)
            .json(update)
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.timeouts.set))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "command to set data failed");
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Map a send failure to either a timeout or a transport error.
fn classify_send_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        Error::Transport(err)
    }
}

/// Extract the plant id from a dashboard URL of the form
/// `/PlantDashboard/Index/{plant_id}`.
fn plant_id_from_dashboard_url(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    match (segments.next(), segments.next(), segments.next()) {
        (Some("PlantDashboard"), Some("Index"), Some(id)) if !id.is_empty() => {
            Some(id.to_owned())
        }
        _ => None,
    }
}
