// ── Plant handle ──
//
// Full lifecycle management for one monitored plant: session, snapshot
// store, background poll loop, write reconciliation, and availability
// notification. Cheaply cloneable via `Arc`; the host application keeps
// one instance per plant and passes clones to whoever needs them.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ariston_api::{AristonClient, PlantData, TransportConfig};

use crate::config::PlantConfig;
use crate::error::CoreError;
use crate::params::ParameterMap;
use crate::store::{Health, SyncState};

const EVENT_CHANNEL_SIZE: usize = 16;

/// Emitted whenever the availability predicate flips in either
/// direction.
///
/// Carries only the plant's display name; consumers re-read the
/// snapshot and availability through the accessors after the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityChanged {
    pub plant: String,
}

/// The main entry point for consumers.
///
/// Owns the three guarded regions the engine relies on: the data region
/// (snapshot + pending changes, one async mutex held across the network
/// call it protects), the health region (error count + initialization
/// latch), and -- inside [`AristonClient`] -- the session region. Lock
/// order is data before session; health is leaf-only.
#[derive(Clone)]
pub struct Plant {
    pub(crate) inner: Arc<PlantInner>,
}

pub(crate) struct PlantInner {
    pub(crate) config: PlantConfig,
    pub(crate) client: AristonClient,
    pub(crate) sync: Mutex<SyncState>,
    pub(crate) health: StdMutex<Health>,
    pub(crate) availability: watch::Sender<bool>,
    pub(crate) event_tx: broadcast::Sender<AvailabilityChanged>,
    pub(crate) cancel: CancellationToken,
    pub(crate) poll_handle: Mutex<Option<JoinHandle<()>>>,
    pub(crate) retry_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Plant {
    /// Create a new plant handle. Does NOT touch the network -- call
    /// [`start()`](Self::start) to begin polling, or drive refreshes
    /// manually with [`refresh_now()`](Self::refresh_now).
    pub fn new(config: PlantConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeouts: config.timeouts,
            cookie_jar: None,
        };
        let client = AristonClient::new(
            config.url.clone(),
            config.username.clone(),
            config.password.clone(),
            &transport,
        )
        .map_err(|e| CoreError::Config {
            message: e.to_string(),
        })?;

        let (availability, _) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(PlantInner {
                config,
                client,
                sync: Mutex::new(SyncState::default()),
                health: StdMutex::new(Health::default()),
                availability,
                event_tx,
                cancel: CancellationToken::new(),
                poll_handle: Mutex::new(None),
                retry_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Display name this plant was configured with.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the background poll loop. The first cycle fires
    /// immediately; calling this twice is a no-op.
    pub async fn start(&self) {
        let mut slot = self.inner.poll_handle.lock().await;
        if slot.is_some() {
            return;
        }
        let plant = self.clone();
        let cancel = self.inner.cancel.clone();
        *slot = Some(tokio::spawn(crate::poll::poll_task(plant, cancel)));
        debug!(plant = %self.name(), "poll loop started");
    }

    /// Stop the poll loop and any armed write retry, waiting for both to
    /// wind down.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.poll_handle.lock().await.take() {
            let _ = handle.await;
        }

        // Retry tasks can arm successors while we join, so drain in
        // rounds without holding the lock across an await.
        loop {
            let batch: Vec<JoinHandle<()>> = {
                let mut retries = self.inner.retry_handles.lock().await;
                retries.drain(..).collect()
            };
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                let _ = handle.await;
            }
        }

        debug!(plant = %self.name(), "shut down");
    }

    // ── Command surface ──────────────────────────────────────────────

    /// Refresh the snapshot once, recording the outcome in the
    /// availability tracking. Poll cycles route through here;
    /// collaborators may too, to force an immediate refresh.
    pub async fn refresh_now(&self) -> Result<(), CoreError> {
        match self.fetch_snapshot().await {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(e) => {
                self.record_failure().await;
                Err(e)
            }
        }
    }

    /// Queue validated parameter changes and reconcile them immediately.
    ///
    /// Fails with a communication error if no snapshot has ever been
    /// fetched -- bounds cannot be validated without one. Individual
    /// unknown or out-of-range values are logged and dropped, never
    /// surfaced as errors.
    pub async fn apply_parameters(&self, params: &ParameterMap) -> Result<(), CoreError> {
        {
            let mut sync = self.inner.sync.lock().await;
            let state = &mut *sync;
            let Some(snapshot) = state.snapshot.as_ref() else {
                warn!(plant = %self.name(), "no data fetched from server yet, cannot validate changes");
                return Err(CoreError::Communication {
                    message: "no plant data fetched yet".into(),
                });
            };
            state.pending.absorb(params, snapshot);
            state.fresh_request = true;
        }
        crate::reconcile::reconcile(self).await
    }

    /// Latest snapshot, if any fetch has ever succeeded.
    pub async fn snapshot(&self) -> Option<PlantData> {
        self.inner.sync.lock().await.snapshot.clone()
    }

    /// Whether the backend is currently considered reachable.
    pub fn is_available(&self) -> bool {
        *self.inner.availability.borrow()
    }

    /// Subscribe to availability transitions.
    pub fn subscribe_availability(&self) -> watch::Receiver<bool> {
        self.inner.availability.subscribe()
    }

    /// Subscribe to availability-changed events.
    pub fn events(&self) -> broadcast::Receiver<AvailabilityChanged> {
        self.inner.event_tx.subscribe()
    }

    /// Whether any values are still queued for transmission.
    pub async fn has_pending_changes(&self) -> bool {
        !self.inner.sync.lock().await.pending.is_empty()
    }

    /// Wall-clock time of the last successful refresh.
    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.sync.lock().await.last_refresh
    }

    /// How long ago the last successful refresh occurred, or `None` if
    /// nothing has been fetched yet.
    pub async fn data_age(&self) -> Option<chrono::Duration> {
        self.last_refresh().await.map(|t| Utc::now() - t)
    }

    // ── Refresh internals ────────────────────────────────────────────

    async fn fetch_snapshot(&self) -> Result<(), CoreError> {
        let plant_id = self.inner.client.ensure_logged_in().await?;

        let mut sync = self.inner.sync.lock().await;

        if let Some(write_start) = sync.write_start {
            if write_start.elapsed() < self.inner.config.set_lock_interval {
                // An in-flight write gets a grace window before the next
                // read may observe its not-yet-applied state. The cycle
                // still counts as healthy.
                debug!(plant = %self.name(), "read deferred inside the set-lock window");
                return Ok(());
            }
        }

        sync.read_start = Some(Instant::now());
        let data = self.inner.client.get_plant_data(&plant_id).await?;
        let finished = Instant::now();

        if let Some(started) = sync.read_start {
            debug!(
                plant = %self.name(),
                elapsed = ?finished.duration_since(started),
                "dashboard fetched"
            );
        }
        sync.read_end = Some(finished);
        sync.last_refresh = Some(Utc::now());
        sync.snapshot = Some(data);
        Ok(())
    }

    /// Record a healthy cycle: reset the error count, latch
    /// initialization, and emit exactly one event if this crossed back
    /// into available.
    fn record_success(&self) {
        let was_offline = {
            let mut health = self.inner.health.lock().expect("health lock poisoned");
            let was_offline = !health.is_available(self.inner.config.max_errors);
            health.errors = 0;
            health.initialized = true;
            was_offline
        };
        if was_offline {
            info!(plant = %self.name(), "back online");
            self.publish_availability(true);
        }
    }

    /// Record a failed cycle; crossing the error threshold flips the
    /// plant offline, drops the session, and emits exactly one event.
    async fn record_failure(&self) {
        let (was_online, now_offline, errors) = {
            let mut health = self.inner.health.lock().expect("health lock poisoned");
            let was_online = health.is_available(self.inner.config.max_errors);
            health.errors += 1;
            (
                was_online,
                !health.is_available(self.inner.config.max_errors),
                health.errors,
            )
        };
        warn!(plant = %self.name(), errors, "refresh failed");
        if was_online && now_offline {
            self.inner.client.invalidate_session().await;
            error!(plant = %self.name(), "offline: too many errors");
            self.publish_availability(false);
        }
    }

    fn publish_availability(&self, available: bool) {
        let _ = self.inner.availability.send(available);
        let _ = self.inner.event_tx.send(AvailabilityChanged {
            plant: self.inner.config.name.clone(),
        });
    }

    /// Delay until the next poll cycle, chosen from the error count as it
    /// stands now -- at or past the degrade threshold the backend gets a
    /// little rest.
    pub(crate) fn next_poll_interval(&self) -> Duration {
        let errors = self
            .inner
            .health
            .lock()
            .expect("health lock poisoned")
            .errors;
        if errors >= self.inner.config.degrade_threshold {
            warn!(
                plant = %self.name(),
                retry_in = ?self.inner.config.degraded_poll_interval,
                "degraded, slowing down polling"
            );
            self.inner.config.degraded_poll_interval
        } else {
            self.inner.config.poll_interval
        }
    }
}
